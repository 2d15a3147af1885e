use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use signing_provider_core::{JsonRpcRequest, Middleware, Next, ProviderError, RpcTransport};

/// Terminal stage: everything that reaches it goes to the chain's RPC node.
pub struct NetworkMiddleware {
    transport: Arc<dyn RpcTransport>,
}

impl NetworkMiddleware {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Middleware for NetworkMiddleware {
    async fn handle(
        &self,
        req: &mut JsonRpcRequest,
        _next: Next<'_>,
    ) -> Result<Value, ProviderError> {
        let params = if req.params.is_null() {
            Value::Array(Vec::new())
        } else {
            req.params.clone()
        };
        self.transport.request(&req.method, params).await
    }
}
