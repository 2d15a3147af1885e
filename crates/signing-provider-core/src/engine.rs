//! Ordered middleware pipeline over a JSON-RPC request envelope.
//!
//! A middleware either resolves the request itself or hands it to the rest of
//! the pipeline through [`Next::run`]. `Next` is consumed by value, so a stage
//! can forward at most once; returning without calling it terminates the request.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProviderError;
use crate::ports::SharedCapability;

fn default_jsonrpc() -> String {
    "2.0".to_owned()
}

#[derive(Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default = "default_jsonrpc")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    /// Opaque capability reference carried by `wallet_updateAccount`. Never serialized.
    #[serde(skip)]
    pub capability: Option<SharedCapability>,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: default_jsonrpc(),
            id: Value::Null,
            method: method.into(),
            params,
            capability: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<Value>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_capability(mut self, capability: SharedCapability) -> Self {
        self.capability = Some(capability);
        self
    }

    /// Positional param `index`; an object `params` counts as position 0.
    pub fn param(&self, index: usize) -> Option<&Value> {
        match &self.params {
            Value::Array(items) => items.get(index),
            Value::Object(_) if index == 0 => Some(&self.params),
            _ => None,
        }
    }

    pub fn decode_param<T: DeserializeOwned>(
        &self,
        index: usize,
        name: &'static str,
    ) -> Result<T, ProviderError> {
        let raw = self
            .param(index)
            .filter(|v| !v.is_null())
            .ok_or(ProviderError::MissingParams(name))?;
        serde_json::from_value(raw.clone()).map_err(|e| {
            ProviderError::InvalidParams(format!("{} param {name}: {e}", self.method))
        })
    }
}

impl fmt::Debug for JsonRpcRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRpcRequest")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("params", &self.params)
            .field("capability", &self.capability.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl JsonRpcResponse {
    pub fn from_result(id: Value, result: Result<Value, ProviderError>) -> Self {
        match result {
            Ok(value) => Self {
                jsonrpc: default_jsonrpc(),
                id,
                result: Some(value),
                error: None,
            },
            Err(e) => Self {
                jsonrpc: default_jsonrpc(),
                id,
                result: None,
                error: Some(e.to_rpc_error()),
            },
        }
    }
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(
        &self,
        req: &mut JsonRpcRequest,
        next: Next<'_>,
    ) -> Result<Value, ProviderError>;
}

/// Remaining stages of the pipeline after the current middleware.
pub struct Next<'a> {
    rest: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub async fn run(self, req: &mut JsonRpcRequest) -> Result<Value, ProviderError> {
        match self.rest.split_first() {
            Some((head, tail)) => head.handle(req, Next { rest: tail }).await,
            None => Err(ProviderError::MethodNotFound(req.method.clone())),
        }
    }
}

#[derive(Clone, Default)]
pub struct Engine {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    pub async fn handle(&self, req: &mut JsonRpcRequest) -> Result<Value, ProviderError> {
        Next {
            rest: &self.middleware,
        }
        .run(req)
        .await
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("stages", &self.middleware.len())
            .finish()
    }
}
