use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;

use crate::domain::{
    canonical_chain_id, ChainConfig, ChainIdState, ProviderEvent, ProviderEventKind,
    ProviderState, ProviderStatePatch,
};
use crate::engine::{Engine, JsonRpcRequest, JsonRpcResponse};
use crate::error::ProviderError;
use crate::events::{EventBus, Listener, ListenerId};
use crate::ports::SharedCapability;
use crate::proxy::{EngineProxy, InstalledEngine};
use crate::state_machine::{provider_transition, ProviderAction, ProviderStatus, StateTransition};

/// Chain registry, provider state, the engine proxy and event plumbing shared by
/// every chain-specific provider.
pub struct BaseProvider {
    chains: RwLock<Vec<ChainConfig>>,
    state: RwLock<ProviderState>,
    status: Mutex<ProviderStatus>,
    proxy: EngineProxy,
    events: EventBus,
    announced_chain: Mutex<Option<String>>,
}

impl BaseProvider {
    pub fn new(chains: Vec<ChainConfig>) -> Result<Self, ProviderError> {
        let provider = Self {
            chains: RwLock::new(Vec::with_capacity(chains.len())),
            state: RwLock::new(ProviderState::default()),
            status: Mutex::new(ProviderStatus::Uninitialized),
            proxy: EngineProxy::new(),
            events: EventBus::new(),
            announced_chain: Mutex::new(None),
        };
        for chain in chains {
            provider.add_chain(chain)?;
        }
        Ok(provider)
    }

    pub fn get_chain(&self, chain_id: &str) -> Result<ChainConfig, ProviderError> {
        let wanted = canonical_chain_id(chain_id)
            .map_err(|_| ProviderError::ChainNotFound(chain_id.to_owned()))?;
        self.chains
            .read()
            .map_err(|e| ProviderError::poisoned("chains", e))?
            .iter()
            .find(|c| c.chain_id == wanted)
            .cloned()
            .ok_or(ProviderError::ChainNotFound(wanted))
    }

    pub fn chains(&self) -> Result<Vec<ChainConfig>, ProviderError> {
        Ok(self
            .chains
            .read()
            .map_err(|e| ProviderError::poisoned("chains", e))?
            .clone())
    }

    /// Registers `config` once. Returns `false` when the chain id is already known;
    /// the existing entry is never replaced.
    pub fn add_chain(&self, config: ChainConfig) -> Result<bool, ProviderError> {
        let config = config.normalized()?;
        let mut g = self
            .chains
            .write()
            .map_err(|e| ProviderError::poisoned("chains", e))?;
        if g.iter().any(|c| c.chain_id == config.chain_id) {
            tracing::debug!(chain_id = %config.chain_id, "chain already registered, ignoring");
            return Ok(false);
        }
        tracing::debug!(chain_id = %config.chain_id, name = %config.display_name, "registered chain");
        g.push(config);
        Ok(true)
    }

    pub fn state(&self) -> Result<ProviderState, ProviderError> {
        Ok(self
            .state
            .read()
            .map_err(|e| ProviderError::poisoned("provider state", e))?
            .clone())
    }

    pub fn chain_id(&self) -> Result<ChainIdState, ProviderError> {
        Ok(self.state()?.chain_id)
    }

    pub fn capability(&self) -> Result<Option<SharedCapability>, ProviderError> {
        Ok(self.state()?.capability)
    }

    /// Merges `patch` into the provider state. A change to a real chain id that
    /// has not been announced yet emits `chainChanged`.
    pub fn update(&self, patch: ProviderStatePatch) -> Result<(), ProviderError> {
        let changed_to = {
            let mut g = self
                .state
                .write()
                .map_err(|e| ProviderError::poisoned("provider state", e))?;
            let mut changed_to = None;
            if let Some(chain_id) = patch.chain_id {
                if g.chain_id != chain_id {
                    changed_to = chain_id.as_chain().map(str::to_owned);
                    g.chain_id = chain_id;
                }
            }
            if let Some(capability) = patch.capability {
                g.capability = Some(capability);
            }
            changed_to
        };

        if let Some(chain_id) = changed_to {
            let announced = self
                .announced_chain
                .lock()
                .map_err(|e| ProviderError::poisoned("announced chain", e))?
                .clone();
            if announced.as_deref() != Some(chain_id.as_str()) {
                self.emit(ProviderEventKind::ChainChanged, Value::String(chain_id))?;
            }
        }
        Ok(())
    }

    pub fn update_provider_engine_proxy(
        &self,
        engine: Engine,
    ) -> Result<Arc<InstalledEngine>, ProviderError> {
        self.proxy.install(engine)
    }

    pub fn proxy(&self) -> &EngineProxy {
        &self.proxy
    }

    pub fn status(&self) -> Result<ProviderStatus, ProviderError> {
        Ok(*self
            .status
            .lock()
            .map_err(|e| ProviderError::poisoned("provider status", e))?)
    }

    pub fn transition(&self, action: ProviderAction) -> Result<StateTransition, ProviderError> {
        let mut g = self
            .status
            .lock()
            .map_err(|e| ProviderError::poisoned("provider status", e))?;
        let (next, transition) = provider_transition(*g, action)?;
        tracing::debug!(
            from = ?transition.from,
            to = ?transition.to,
            reason = transition.reason,
            "provider transition"
        );
        *g = next;
        Ok(transition)
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.proxy.request(method, params).await
    }

    /// Serves `req` and folds failures into a JSON-RPC error object.
    pub async fn request_raw(&self, mut req: JsonRpcRequest) -> JsonRpcResponse {
        let result = self.proxy.dispatch(&mut req).await;
        JsonRpcResponse::from_result(req.id, result)
    }

    pub fn on(
        &self,
        kind: ProviderEventKind,
        listener: impl Fn(&ProviderEvent) + Send + Sync + 'static,
    ) -> Result<ListenerId, ProviderError> {
        self.events.on(Some(kind), Arc::new(listener))
    }

    pub fn on_any(&self, listener: Listener) -> Result<ListenerId, ProviderError> {
        self.events.on(None, listener)
    }

    pub fn off(&self, id: ListenerId) -> Result<bool, ProviderError> {
        self.events.off(id)
    }

    pub fn emit(&self, kind: ProviderEventKind, data: Value) -> Result<ProviderEvent, ProviderError> {
        match kind {
            ProviderEventKind::ChainChanged => {
                *self
                    .announced_chain
                    .lock()
                    .map_err(|e| ProviderError::poisoned("announced chain", e))? =
                    data.as_str().map(str::to_owned);
            }
            ProviderEventKind::Disconnect => {
                *self
                    .announced_chain
                    .lock()
                    .map_err(|e| ProviderError::poisoned("announced chain", e))? = None;
            }
            ProviderEventKind::Connect | ProviderEventKind::AccountsChanged => {}
        }
        self.events.emit(kind, data)
    }

    pub fn drain_events(&self) -> Result<Vec<ProviderEvent>, ProviderError> {
        self.events.drain()
    }
}
