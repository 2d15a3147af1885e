use std::sync::{Arc, OnceLock, Weak};

use alloy::primitives::{Address, U256, U64};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio::sync::OnceCell;

use signing_provider_core::{
    ChainConfig, InstalledEngine, JsonRpcRequest, ProviderError, TransactionFormatter,
    TransactionParams,
};

use crate::ProviderConfig;

const LEGACY_TX_TYPE: u64 = 0;
const EIP1559_TX_TYPE: u64 = 2;

/// Fills nonce, gas, fee and chain id fields through the pipeline it belongs to.
///
/// The formatter is built before its pipeline exists, so the pipeline is bound
/// afterwards with [`EthTransactionFormatter::bind`]. Lookups always go to that
/// pipeline, never to whichever one the provider has installed since.
pub struct EthTransactionFormatter {
    engine: OnceLock<Weak<InstalledEngine>>,
    chain: ChainConfig,
    priority_fee_fallback: U256,
    chain_id: OnceLock<u64>,
    eip1559: OnceCell<bool>,
}

impl EthTransactionFormatter {
    pub fn new(chain: ChainConfig, config: &ProviderConfig) -> Self {
        Self {
            engine: OnceLock::new(),
            chain,
            priority_fee_fallback: U256::from(config.eip1559_priority_fee_fallback_wei),
            chain_id: OnceLock::new(),
            eip1559: OnceCell::new(),
        }
    }

    /// Pins the formatter to the pipeline that carries it. Held weakly, since
    /// that pipeline owns the formatter.
    pub fn bind(&self, installed: &Arc<InstalledEngine>) -> Result<(), ProviderError> {
        self.engine
            .set(Arc::downgrade(installed))
            .map_err(|_| ProviderError::Internal("transaction formatter already bound".to_owned()))?;
        tracing::debug!(generation = installed.generation, "transaction formatter bound");
        Ok(())
    }

    fn bound_chain_id(&self) -> Result<u64, ProviderError> {
        self.chain_id
            .get()
            .copied()
            .ok_or(ProviderError::ProviderNotInitialized("transaction formatter not initialized"))
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let installed = self
            .engine
            .get()
            .ok_or(ProviderError::ProviderNotInitialized("transaction formatter not bound"))?
            .upgrade()
            .ok_or(ProviderError::ProviderNotInitialized("transaction formatter pipeline released"))?;
        let mut req = JsonRpcRequest::new(method, params);
        tracing::trace!(generation = installed.generation, method, "formatter lookup");
        installed.engine.handle(&mut req).await
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, ProviderError> {
        let raw = self.request(method, params).await?;
        serde_json::from_value(raw)
            .map_err(|e| ProviderError::Transport(format!("{method} returned an unexpected value: {e}")))
    }

    async fn latest_base_fee(&self) -> Result<Option<U256>, ProviderError> {
        let block = self
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        match block.get("baseFeePerGas") {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|e| ProviderError::InvalidParams(format!("baseFeePerGas: {e}"))),
        }
    }

    async fn supports_eip1559(&self) -> Result<bool, ProviderError> {
        self.eip1559
            .get_or_try_init(|| async {
                let supported = self.latest_base_fee().await?.is_some();
                tracing::debug!(chain_id = %self.chain.chain_id, supported, "detected eip-1559 support");
                Ok::<bool, ProviderError>(supported)
            })
            .await
            .copied()
    }

    async fn fill_fees(&self, tx: &mut TransactionParams) -> Result<(), ProviderError> {
        if tx.gas_price.is_some() {
            tx.max_fee_per_gas = None;
            tx.max_priority_fee_per_gas = None;
            tx.tx_type.get_or_insert(U64::from(LEGACY_TX_TYPE));
            return Ok(());
        }

        let wants_1559 = tx.is_eip1559() || tx.tx_type == Some(U64::from(EIP1559_TX_TYPE));
        let wants_legacy = !wants_1559 && tx.tx_type == Some(U64::from(LEGACY_TX_TYPE));
        if wants_legacy || (!wants_1559 && !self.supports_eip1559().await?) {
            tx.gas_price = Some(self.call("eth_gasPrice", json!([])).await?);
            tx.tx_type = Some(U64::from(LEGACY_TX_TYPE));
            return Ok(());
        }

        let priority = match tx.max_priority_fee_per_gas {
            Some(fee) => fee,
            None => match self.call::<U256>("eth_maxPriorityFeePerGas", json!([])).await {
                Ok(fee) => fee,
                Err(e) => {
                    tracing::warn!(error = %e, "eth_maxPriorityFeePerGas unavailable, using fallback");
                    self.priority_fee_fallback
                }
            },
        };
        if tx.max_fee_per_gas.is_none() {
            let base_fee = self.latest_base_fee().await?.unwrap_or_default();
            tx.max_fee_per_gas = Some(base_fee.saturating_mul(U256::from(2)).saturating_add(priority));
        }
        tx.max_priority_fee_per_gas = Some(priority);
        tx.tx_type = Some(U64::from(EIP1559_TX_TYPE));
        Ok(())
    }
}

#[async_trait]
impl TransactionFormatter for EthTransactionFormatter {
    async fn init(&self) -> Result<(), ProviderError> {
        let chain_id = self.chain.chain_id_u64()?;
        if self.chain_id.set(chain_id).is_err() {
            tracing::debug!(chain_id, "transaction formatter already initialized");
        }
        Ok(())
    }

    async fn format(
        &self,
        mut tx: TransactionParams,
        from: Address,
    ) -> Result<TransactionParams, ProviderError> {
        let chain_id = self.bound_chain_id()?;
        match tx.chain_id {
            Some(requested) if requested != U64::from(chain_id) => {
                return Err(ProviderError::InvalidParams(format!(
                    "transaction chainId {requested} does not match active chain {chain_id}"
                )))
            }
            _ => tx.chain_id = Some(U64::from(chain_id)),
        }
        tx.from = Some(from);

        if tx.nonce.is_none() {
            tx.nonce = Some(self.call("eth_getTransactionCount", json!([from, "pending"])).await?);
        }
        self.fill_fees(&mut tx).await?;
        if tx.gas.is_none() {
            let estimate_input = serde_json::to_value(&tx)
                .map_err(|e| ProviderError::Internal(format!("serialize tx for estimate: {e}")))?;
            tx.gas = Some(self.call("eth_estimateGas", json!([estimate_input])).await?);
        }
        Ok(tx)
    }
}
