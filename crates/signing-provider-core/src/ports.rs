use std::sync::Arc;

use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{
    ChainConfig, PublicKey, RecoverableSignature, SwitchChainParams, TransactionParams,
};
use crate::error::ProviderError;

/// Externally owned signer (hardware wallet, remote MPC session, ...).
/// Private key material never crosses this boundary.
#[async_trait]
pub trait SigningCapability: Send + Sync {
    /// Signs a 32-byte digest. `raw_message` is the pre-image when the caller has one.
    async fn sign(
        &self,
        hash: B256,
        raw_message: Option<&[u8]>,
    ) -> Result<RecoverableSignature, ProviderError>;

    async fn public_key(&self) -> Result<PublicKey, ProviderError>;
}

pub type SharedCapability = Arc<dyn SigningCapability>;

#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

#[async_trait]
pub trait SwitchChainHandler: Send + Sync {
    async fn switch_chain(&self, params: SwitchChainParams) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait AddChainHandler: Send + Sync {
    async fn add_chain(&self, config: ChainConfig) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait AccountUpdateHandler: Send + Sync {
    async fn update_account(&self, capability: SharedCapability) -> Result<(), ProviderError>;
}

/// Normalizes outgoing transaction fields before they reach the signer.
#[async_trait]
pub trait TransactionFormatter: Send + Sync {
    async fn init(&self) -> Result<(), ProviderError>;

    async fn format(
        &self,
        tx: TransactionParams,
        from: Address,
    ) -> Result<TransactionParams, ProviderError>;
}
