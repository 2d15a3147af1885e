pub mod base;
pub mod domain;
pub mod engine;
pub mod error;
pub mod events;
pub mod middleware;
pub mod ports;
pub mod proxy;
pub mod state_machine;

pub use base::BaseProvider;
pub use domain::{
    canonical_chain_id, parse_chain_id, parse_hex_chain_id, to_hex_chain_id,
    AddEthereumChainParameter, ChainConfig, ChainIdState, ChainNamespace, NativeCurrency,
    ProviderEvent, ProviderEventKind, ProviderState, ProviderStatePatch, PublicKey,
    RecoverableSignature, SwitchChainParams, TransactionParams,
};
pub use engine::{Engine, JsonRpcRequest, JsonRpcResponse, Middleware, Next};
pub use error::ProviderError;
pub use events::{EventBus, Listener, ListenerId};
pub use middleware::{
    AccountMiddleware, ChainSwitchMiddleware, ADD_CHAIN_METHOD, SWITCH_CHAIN_METHOD,
    UPDATE_ACCOUNT_METHOD,
};
pub use ports::{
    AccountUpdateHandler, AddChainHandler, RpcTransport, SharedCapability, SigningCapability,
    SwitchChainHandler, TransactionFormatter,
};
pub use proxy::{EngineProxy, InstalledEngine};
pub use state_machine::{provider_transition, ProviderAction, ProviderStatus, StateTransition};
