use serde_json::Value;
use thiserror::Error;

use crate::domain::ChainNamespace;

pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const UNAUTHORIZED: i64 = 4100;
pub const UNSUPPORTED_METHOD: i64 = 4200;
pub const DISCONNECTED: i64 = 4900;
pub const CHAIN_DISCONNECTED: i64 = 4901;
pub const UNRECOGNIZED_CHAIN: i64 = 4902;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("chain config not found for chain id: {0}")]
    ChainNotFound(String),
    #[error("incompatible chain namespace: expected eip155, got {0}")]
    IncompatibleChainNamespace(ChainNamespace),
    #[error("signing methods are unavailable: {0}")]
    SigningMethodsUnavailable(&'static str),
    #[error("provider is not initialized: {0}")]
    ProviderNotInitialized(&'static str),
    #[error("chain disconnected: {0}")]
    ChainDisconnected(String),
    #[error("missing params: {0}")]
    MissingParams(&'static str),
    #[error("method not found: {0}")]
    MethodNotFound(String),
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },
    #[error("signing error: {0}")]
    Signing(String),
    #[error("operation cancelled: {0}")]
    Cancelled(&'static str),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ProviderError {
    pub fn code(&self) -> i64 {
        match self {
            Self::ChainNotFound(_) => UNRECOGNIZED_CHAIN,
            Self::IncompatibleChainNamespace(_) => INVALID_PARAMS,
            Self::SigningMethodsUnavailable(_) => UNSUPPORTED_METHOD,
            Self::ProviderNotInitialized(_) => DISCONNECTED,
            Self::ChainDisconnected(_) => CHAIN_DISCONNECTED,
            Self::MissingParams(_) | Self::InvalidParams(_) => INVALID_PARAMS,
            Self::MethodNotFound(_) => METHOD_NOT_FOUND,
            Self::Unauthorized(_) => UNAUTHORIZED,
            Self::Rpc { code, .. } => *code,
            Self::Transport(_) | Self::Signing(_) | Self::Cancelled(_) | Self::Internal(_) => {
                INTERNAL_ERROR
            }
        }
    }

    /// JSON-RPC error object (`{code, message, data?}`) for this error.
    pub fn to_rpc_error(&self) -> Value {
        let mut obj = serde_json::json!({
            "code": self.code(),
            "message": self.to_string(),
        });
        if let Self::Rpc {
            data: Some(data), ..
        } = self
        {
            obj["data"] = data.clone();
        }
        obj
    }

    /// Rebuilds an error from a JSON-RPC error object returned by a node.
    pub fn from_rpc_error(err: &Value) -> Self {
        let code = err
            .get("code")
            .and_then(Value::as_i64)
            .unwrap_or(INTERNAL_ERROR);
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown rpc error")
            .to_owned();
        Self::Rpc {
            code,
            message,
            data: err.get("data").cloned(),
        }
    }

    pub(crate) fn poisoned(what: &str, e: impl std::fmt::Display) -> Self {
        Self::Internal(format!("{what} lock poisoned: {e}"))
    }
}
