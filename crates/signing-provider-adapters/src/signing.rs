use std::sync::Arc;

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy::dyn_abi::TypedData;
use alloy::eips::eip2718::Encodable2718;
use alloy::eips::eip2930::AccessList;
use alloy::primitives::{eip191_hash_message, Address, PrimitiveSignature, TxKind, B256, U256};
use async_trait::async_trait;
use serde_json::{json, Value};

use signing_provider_core::{
    JsonRpcRequest, Middleware, Next, ProviderError, SharedCapability, TransactionFormatter,
    TransactionParams,
};

/// Serves account and signing methods from the signing capability; forwards the rest.
pub struct SigningMiddleware {
    capability: SharedCapability,
    formatter: Arc<dyn TransactionFormatter>,
}

impl SigningMiddleware {
    pub fn new(capability: SharedCapability, formatter: Arc<dyn TransactionFormatter>) -> Self {
        Self {
            capability,
            formatter,
        }
    }

    async fn account(&self) -> Result<Address, ProviderError> {
        Ok(self.capability.public_key().await?.address())
    }

    async fn authorize(&self, requested: Address) -> Result<Address, ProviderError> {
        let account = self.account().await?;
        if requested != account {
            return Err(ProviderError::Unauthorized(format!(
                "{requested} is not the signing account"
            )));
        }
        Ok(account)
    }

    async fn personal_sign(&self, req: &JsonRpcRequest) -> Result<Value, ProviderError> {
        let data: String = req.decode_param(0, "data")?;
        let address: Address = req.decode_param(1, "address")?;
        self.authorize(address).await?;
        let message = message_bytes(&data);
        let sig = self
            .capability
            .sign(eip191_hash_message(&message), Some(&message))
            .await?;
        Ok(Value::String(sig.to_hex()?))
    }

    async fn eth_sign(&self, req: &JsonRpcRequest) -> Result<Value, ProviderError> {
        let address: Address = req.decode_param(0, "address")?;
        let data: String = req.decode_param(1, "data")?;
        self.authorize(address).await?;
        let bytes = decode_hex(&data)?;
        if bytes.len() != 32 {
            return Err(ProviderError::InvalidParams(format!(
                "eth_sign expects a 32-byte hash, got {} bytes",
                bytes.len()
            )));
        }
        let sig = self.capability.sign(B256::from_slice(&bytes), None).await?;
        Ok(Value::String(sig.to_hex()?))
    }

    async fn sign_typed_data(&self, req: &JsonRpcRequest) -> Result<Value, ProviderError> {
        let address: Address = req.decode_param(0, "address")?;
        self.authorize(address).await?;
        let raw = req
            .param(1)
            .filter(|v| !v.is_null())
            .ok_or(ProviderError::MissingParams("typedData"))?;
        let typed: TypedData = match raw {
            Value::String(s) => serde_json::from_str(s),
            other => serde_json::from_value(other.clone()),
        }
        .map_err(|e| ProviderError::InvalidParams(format!("typedData: {e}")))?;
        let hash = typed
            .eip712_signing_hash()
            .map_err(|e| ProviderError::InvalidParams(format!("typedData hash: {e}")))?;
        let sig = self.capability.sign(hash, None).await?;
        Ok(Value::String(sig.to_hex()?))
    }

    async fn sign_transaction(&self, req: &JsonRpcRequest) -> Result<String, ProviderError> {
        let tx: TransactionParams = req.decode_param(0, "transaction")?;
        let account = match tx.from {
            Some(from) => self.authorize(from).await?,
            None => self.account().await?,
        };
        let tx = self.formatter.format(tx, account).await?;
        let raw = self.encode_signed(&tx).await?;
        tracing::debug!(from = %account, bytes = raw.len(), "signed transaction");
        Ok(format!("0x{}", alloy::hex::encode(raw)))
    }

    async fn encode_signed(&self, tx: &TransactionParams) -> Result<Vec<u8>, ProviderError> {
        let chain_id = required(tx.chain_id, "chainId")?.to::<u64>();
        let nonce = required(tx.nonce, "nonce")?.to::<u64>();
        let gas_limit = required(tx.gas, "gas")?.to::<u64>();
        let to = tx.to.map(TxKind::Call).unwrap_or(TxKind::Create);
        let value = tx.value.unwrap_or_default();
        let input = tx.data.clone().unwrap_or_default();

        let envelope = if tx.is_eip1559() {
            let unsigned = TxEip1559 {
                chain_id,
                nonce,
                gas_limit,
                max_fee_per_gas: fee_u128(required(tx.max_fee_per_gas, "maxFeePerGas")?)?,
                max_priority_fee_per_gas: fee_u128(required(
                    tx.max_priority_fee_per_gas,
                    "maxPriorityFeePerGas",
                )?)?,
                to,
                value,
                access_list: AccessList::default(),
                input,
            };
            let sig = self.sign_hash(unsigned.signature_hash()).await?;
            TxEnvelope::from(unsigned.into_signed(sig))
        } else {
            let unsigned = TxLegacy {
                chain_id: Some(chain_id),
                nonce,
                gas_price: fee_u128(required(tx.gas_price, "gasPrice")?)?,
                gas_limit,
                to,
                value,
                input,
            };
            let sig = self.sign_hash(unsigned.signature_hash()).await?;
            TxEnvelope::from(unsigned.into_signed(sig))
        };
        Ok(envelope.encoded_2718())
    }

    async fn sign_hash(&self, hash: B256) -> Result<PrimitiveSignature, ProviderError> {
        let sig = self.capability.sign(hash, None).await?;
        Ok(PrimitiveSignature::new(
            U256::from_be_slice(sig.r.as_slice()),
            U256::from_be_slice(sig.s.as_slice()),
            sig.y_parity()?,
        ))
    }
}

#[async_trait]
impl Middleware for SigningMiddleware {
    async fn handle(
        &self,
        req: &mut JsonRpcRequest,
        next: Next<'_>,
    ) -> Result<Value, ProviderError> {
        match req.method.as_str() {
            "eth_accounts" | "eth_requestAccounts" => Ok(json!([self.account().await?])),
            "personal_sign" => self.personal_sign(req).await,
            "eth_sign" => self.eth_sign(req).await,
            "eth_signTypedData_v4" => self.sign_typed_data(req).await,
            "eth_signTransaction" => Ok(Value::String(self.sign_transaction(req).await?)),
            "eth_sendTransaction" => {
                let raw = self.sign_transaction(req).await?;
                req.method = "eth_sendRawTransaction".to_owned();
                req.params = json!([raw]);
                next.run(req).await
            }
            _ => next.run(req).await,
        }
    }
}

fn required<T>(value: Option<T>, field: &'static str) -> Result<T, ProviderError> {
    value.ok_or(ProviderError::MissingParams(field))
}

fn fee_u128(fee: U256) -> Result<u128, ProviderError> {
    u128::try_from(fee).map_err(|_| ProviderError::InvalidParams(format!("fee out of range: {fee}")))
}

fn decode_hex(data: &str) -> Result<Vec<u8>, ProviderError> {
    alloy::hex::decode(data).map_err(|e| ProviderError::InvalidParams(format!("invalid hex data: {e}")))
}

// personal_sign payloads are hex when 0x-prefixed, plain UTF-8 otherwise.
fn message_bytes(data: &str) -> Vec<u8> {
    match data.strip_prefix("0x") {
        Some(_) => alloy::hex::decode(data).unwrap_or_else(|_| data.as_bytes().to_vec()),
        None => data.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_bytes_decodes_hex_and_keeps_text() {
        assert_eq!(message_bytes("0x6869"), b"hi".to_vec());
        assert_eq!(message_bytes("hello"), b"hello".to_vec());
        assert_eq!(message_bytes("0xzz"), b"0xzz".to_vec());
    }

    #[test]
    fn test_fee_u128_rejects_overflow() {
        assert_eq!(fee_u128(U256::from(7u64)).unwrap(), 7);
        assert!(fee_u128(U256::MAX).is_err());
    }
}
