use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use signing_provider_core::{ChainConfig, ProviderError, RpcTransport};

use crate::ProviderConfig;

/// JSON-RPC over HTTP POST against a chain's `rpcTarget`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
    next_id: Arc<AtomicU64>,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut builder = reqwest::Client::builder();
        if let Some(ms) = config.rpc_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build http client: {e}")))?;
        Ok(Self {
            url: url.into(),
            client,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(format!("{method} request failed: {e}")))?;
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(format!("{method} json decode failed: {e}")))?;
        if let Some(err) = body.get("error").filter(|e| !e.is_null()) {
            return Err(ProviderError::from_rpc_error(err));
        }
        if !status.is_success() {
            return Err(ProviderError::Transport(format!(
                "{method} returned status {status}: {body}"
            )));
        }
        body.get("result")
            .cloned()
            .ok_or_else(|| ProviderError::Transport(format!("{method} response missing result")))
    }
}

/// Decides which transport serves a chain config.
pub trait TransportFactory: Send + Sync {
    fn transport(&self, chain: &ChainConfig) -> Result<Arc<dyn RpcTransport>, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct HttpTransportFactory {
    config: ProviderConfig,
}

impl HttpTransportFactory {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn transport(&self, chain: &ChainConfig) -> Result<Arc<dyn RpcTransport>, ProviderError> {
        Ok(Arc::new(HttpTransport::new(chain.rpc_target.clone(), &self.config)?))
    }
}
