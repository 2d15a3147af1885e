use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{AddEthereumChainParameter, ChainConfig, SwitchChainParams};
use crate::engine::{JsonRpcRequest, Middleware, Next};
use crate::error::ProviderError;
use crate::ports::{AccountUpdateHandler, AddChainHandler, SwitchChainHandler};

pub const SWITCH_CHAIN_METHOD: &str = "wallet_switchEthereumChain";
pub const ADD_CHAIN_METHOD: &str = "wallet_addEthereumChain";
pub const UPDATE_ACCOUNT_METHOD: &str = "wallet_updateAccount";

/// Routes chain-switch and add-chain requests into the provider's handlers.
pub struct ChainSwitchMiddleware {
    switch_chain: Arc<dyn SwitchChainHandler>,
    add_chain: Arc<dyn AddChainHandler>,
}

impl ChainSwitchMiddleware {
    pub fn new(switch_chain: Arc<dyn SwitchChainHandler>, add_chain: Arc<dyn AddChainHandler>) -> Self {
        Self {
            switch_chain,
            add_chain,
        }
    }
}

#[async_trait]
impl Middleware for ChainSwitchMiddleware {
    async fn handle(
        &self,
        req: &mut JsonRpcRequest,
        next: Next<'_>,
    ) -> Result<Value, ProviderError> {
        match req.method.as_str() {
            SWITCH_CHAIN_METHOD => {
                let params: SwitchChainParams = req.decode_param(0, "chainId")?;
                self.switch_chain.switch_chain(params).await?;
                Ok(Value::Null)
            }
            ADD_CHAIN_METHOD => {
                let config = decode_chain_config(req)?;
                self.add_chain.add_chain(config).await?;
                Ok(Value::Null)
            }
            _ => next.run(req).await,
        }
    }
}

// Accepts either a full ChainConfig or the EIP-3085 parameter object.
fn decode_chain_config(req: &JsonRpcRequest) -> Result<ChainConfig, ProviderError> {
    let raw = req
        .param(0)
        .filter(|v| !v.is_null())
        .ok_or(ProviderError::MissingParams("chain config"))?;
    if raw.get("chainNamespace").is_some() {
        let config: ChainConfig = serde_json::from_value(raw.clone())
            .map_err(|e| ProviderError::InvalidParams(format!("chain config: {e}")))?;
        return config.normalized();
    }
    let params: AddEthereumChainParameter = serde_json::from_value(raw.clone())
        .map_err(|e| ProviderError::InvalidParams(format!("addEthereumChain params: {e}")))?;
    ChainConfig::try_from(params)
}

/// Routes account-refresh requests carrying a capability reference into the provider.
pub struct AccountMiddleware {
    handler: Arc<dyn AccountUpdateHandler>,
}

impl AccountMiddleware {
    pub fn new(handler: Arc<dyn AccountUpdateHandler>) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl Middleware for AccountMiddleware {
    async fn handle(
        &self,
        req: &mut JsonRpcRequest,
        next: Next<'_>,
    ) -> Result<Value, ProviderError> {
        if req.method != UPDATE_ACCOUNT_METHOD {
            return next.run(req).await;
        }
        let capability = req
            .capability
            .take()
            .ok_or(ProviderError::MissingParams("signing capability"))?;
        self.handler.update_account(capability).await?;
        Ok(Value::Null)
    }
}
