//! Concrete provider for the `eip155` namespace.
//!
//! Every lifecycle operation (setup, chain switch, account update, add chain)
//! runs under one async mutex, so at most one of them mutates the provider at
//! a time. Each also races the provider's cancellation token; `disconnect`
//! trips the token, which aborts whatever lifecycle step is still pending.

use std::future::Future;
use std::sync::{Arc, Mutex, Weak};

use alloy::primitives::Address;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use signing_provider_core::{
    canonical_chain_id, parse_chain_id, AccountMiddleware, AccountUpdateHandler, AddChainHandler,
    BaseProvider, ChainConfig, ChainIdState, ChainNamespace, ChainSwitchMiddleware, Engine,
    InstalledEngine, JsonRpcRequest, JsonRpcResponse, ListenerId, ProviderAction, ProviderError,
    ProviderEvent, ProviderEventKind, ProviderState, ProviderStatePatch, ProviderStatus,
    SharedCapability, SwitchChainHandler, SwitchChainParams, TransactionFormatter,
};

use crate::{
    EthTransactionFormatter, HttpTransportFactory, NetworkMiddleware, ProviderConfig,
    SigningMiddleware, TransportFactory,
};

#[derive(Clone)]
pub struct EthereumSigningProvider {
    inner: Arc<ProviderInner>,
}

struct ProviderInner {
    base: BaseProvider,
    config: ProviderConfig,
    transports: Arc<dyn TransportFactory>,
    lifecycle: tokio::sync::Mutex<()>,
    cancel: Mutex<CancellationToken>,
}

impl EthereumSigningProvider {
    pub fn new(config: ProviderConfig, chains: Vec<ChainConfig>) -> Result<Self, ProviderError> {
        let transports = Arc::new(HttpTransportFactory::new(config.clone()));
        Self::with_transport_factory(config, chains, transports)
    }

    pub fn with_transport_factory(
        config: ProviderConfig,
        chains: Vec<ChainConfig>,
        transports: Arc<dyn TransportFactory>,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            inner: Arc::new(ProviderInner {
                base: BaseProvider::new(chains)?,
                config,
                transports,
                lifecycle: tokio::sync::Mutex::new(()),
                cancel: Mutex::new(CancellationToken::new()),
            }),
        })
    }

    /// Builds a provider for `chain` and runs setup against it.
    pub async fn connect(
        config: ProviderConfig,
        chain: ChainConfig,
        capability: SharedCapability,
    ) -> Result<Self, ProviderError> {
        let chain = chain.normalized()?;
        let chain_id = chain.chain_id.clone();
        let provider = Self::new(config, vec![chain])?;
        provider.setup_provider(capability, &chain_id).await?;
        Ok(provider)
    }

    pub async fn enable(&self) -> Result<Vec<Address>, ProviderError> {
        self.inner.enable().await
    }

    pub async fn setup_provider(
        &self,
        capability: SharedCapability,
        chain_id: &str,
    ) -> Result<(), ProviderError> {
        let inner = &self.inner;
        inner
            .guarded("setup_provider", async {
                let _guard = inner.lifecycle.lock().await;
                inner.setup_locked(capability, chain_id).await
            })
            .await
    }

    pub async fn update_account(&self, capability: SharedCapability) -> Result<(), ProviderError> {
        self.inner.update_account(capability).await
    }

    pub async fn switch_chain(&self, params: SwitchChainParams) -> Result<(), ProviderError> {
        self.inner.switch_chain(params).await
    }

    pub async fn add_chain(&self, config: ChainConfig) -> Result<(), ProviderError> {
        self.inner.add_chain(config).await
    }

    pub async fn lookup_network(&self, chain_id: &str) -> Result<u64, ProviderError> {
        self.inner.lookup_network(chain_id).await
    }

    /// Cancels pending lifecycle work, uninstalls the pipeline and emits `disconnect`.
    /// Known chains and the stored capability survive, so `enable` reconnects.
    pub async fn disconnect(&self) -> Result<(), ProviderError> {
        let inner = &self.inner;
        {
            let mut token = inner
                .cancel
                .lock()
                .map_err(|e| ProviderError::Internal(format!("cancel token lock poisoned: {e}")))?;
            token.cancel();
            *token = CancellationToken::new();
        }
        let _guard = inner.lifecycle.lock().await;
        inner.base.proxy().clear()?;
        inner.base.transition(ProviderAction::Disconnect)?;
        inner.base.emit(
            ProviderEventKind::Disconnect,
            json!({ "code": signing_provider_core::error::DISCONNECTED, "message": "provider disconnected" }),
        )?;
        tracing::info!("signing provider disconnected");
        Ok(())
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.inner.base.request(method, params).await
    }

    pub async fn request_raw(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        self.inner.base.request_raw(req).await
    }

    pub fn on(
        &self,
        kind: ProviderEventKind,
        listener: impl Fn(&ProviderEvent) + Send + Sync + 'static,
    ) -> Result<ListenerId, ProviderError> {
        self.inner.base.on(kind, listener)
    }

    pub fn off(&self, id: ListenerId) -> Result<bool, ProviderError> {
        self.inner.base.off(id)
    }

    pub fn emit(&self, kind: ProviderEventKind, data: Value) -> Result<ProviderEvent, ProviderError> {
        self.inner.base.emit(kind, data)
    }

    pub fn drain_events(&self) -> Result<Vec<ProviderEvent>, ProviderError> {
        self.inner.base.drain_events()
    }

    pub fn chain_id(&self) -> Result<ChainIdState, ProviderError> {
        self.inner.base.chain_id()
    }

    pub fn state(&self) -> Result<ProviderState, ProviderError> {
        self.inner.base.state()
    }

    pub fn status(&self) -> Result<ProviderStatus, ProviderError> {
        self.inner.base.status()
    }

    pub fn chains(&self) -> Result<Vec<ChainConfig>, ProviderError> {
        self.inner.base.chains()
    }

    pub fn engine_generation(&self) -> Result<Option<u64>, ProviderError> {
        self.inner.base.proxy().generation()
    }

    pub fn current_engine(&self) -> Result<Option<Arc<InstalledEngine>>, ProviderError> {
        self.inner.base.proxy().current()
    }
}

impl ProviderInner {
    fn cancel_token(&self) -> Result<CancellationToken, ProviderError> {
        Ok(self
            .cancel
            .lock()
            .map_err(|e| ProviderError::Internal(format!("cancel token lock poisoned: {e}")))?
            .clone())
    }

    async fn guarded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        let token = self.cancel_token()?;
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::warn!(operation, "lifecycle operation cancelled");
                Err(ProviderError::Cancelled(operation))
            }
            out = fut => out,
        }
    }

    async fn enable(self: &Arc<Self>) -> Result<Vec<Address>, ProviderError> {
        self.guarded("enable", async {
            let _guard = self.lifecycle.lock().await;
            let capability = self
                .base
                .capability()?
                .ok_or(ProviderError::SigningMethodsUnavailable("no signing capability stored"))?;
            let chain_id = self
                .base
                .chain_id()?
                .as_chain()
                .map(str::to_owned)
                .ok_or(ProviderError::ProviderNotInitialized("chain id is loading"))?;
            self.setup_locked(capability, &chain_id).await?;
            let accounts = self.base.request("eth_accounts", json!([])).await?;
            serde_json::from_value(accounts)
                .map_err(|e| ProviderError::Internal(format!("eth_accounts result: {e}")))
        })
        .await
    }

    async fn setup_locked(
        self: &Arc<Self>,
        capability: SharedCapability,
        chain_id: &str,
    ) -> Result<(), ProviderError> {
        let chain = self.base.get_chain(chain_id)?;
        if chain.chain_namespace != ChainNamespace::Eip155 {
            return Err(ProviderError::IncompatibleChainNamespace(chain.chain_namespace));
        }
        tracing::info!(chain_id = %chain.chain_id, rpc = %chain.rpc_target, "setting up signing provider");

        let formatter = Arc::new(EthTransactionFormatter::new(chain.clone(), &self.config));
        formatter.init().await?;

        let transport = self.transports.transport(&chain)?;
        let handlers = Arc::new(ProviderHandlers {
            inner: Arc::downgrade(self),
        });
        let mut engine = Engine::new();
        engine
            .push(SigningMiddleware::new(Arc::clone(&capability), formatter.clone()))
            .push(ChainSwitchMiddleware::new(handlers.clone(), handlers.clone()))
            .push(AccountMiddleware::new(handlers))
            .push(NetworkMiddleware::new(transport));
        let installed = self.base.update_provider_engine_proxy(engine)?;
        formatter.bind(&installed)?;

        if self.config.skip_lookup_network {
            tracing::debug!(chain_id = %chain.chain_id, "network lookup skipped");
        } else {
            self.lookup_network(&chain.chain_id).await?;
        }

        self.base.update(ProviderStatePatch::capability(capability))?;
        self.base
            .emit(ProviderEventKind::ChainChanged, Value::String(chain.chain_id.clone()))?;
        self.base
            .emit(ProviderEventKind::Connect, json!({ "chainId": chain.chain_id }))?;
        self.base
            .update(ProviderStatePatch::chain_id(ChainIdState::Chain(chain.chain_id.clone())))?;
        self.base.transition(ProviderAction::SetupComplete)?;
        tracing::info!(
            chain_id = %chain.chain_id,
            generation = installed.generation,
            "signing provider ready"
        );
        Ok(())
    }

    async fn update_account(self: &Arc<Self>, capability: SharedCapability) -> Result<(), ProviderError> {
        self.guarded("update_account", async {
            let _guard = self.lifecycle.lock().await;
            self.update_account_locked(capability).await
        })
        .await
    }

    async fn update_account_locked(
        self: &Arc<Self>,
        capability: SharedCapability,
    ) -> Result<(), ProviderError> {
        if !self.base.proxy().is_installed()? {
            return Err(ProviderError::ProviderNotInitialized("no engine installed"));
        }
        let stored = self
            .base
            .capability()?
            .ok_or(ProviderError::SigningMethodsUnavailable("no signing capability stored"))?;
        if stored.public_key().await? == capability.public_key().await? {
            tracing::debug!("account unchanged, keeping current pipeline");
            return Ok(());
        }
        let chain_id = self
            .base
            .chain_id()?
            .as_chain()
            .map(str::to_owned)
            .ok_or(ProviderError::ProviderNotInitialized("chain id is loading"))?;

        tracing::info!(chain_id = %chain_id, "account changed, rebuilding pipeline");
        self.setup_locked(capability, &chain_id).await?;
        let accounts = self.base.request("eth_accounts", json!([])).await?;
        self.base.emit(ProviderEventKind::AccountsChanged, accounts)?;
        Ok(())
    }

    async fn switch_chain(self: &Arc<Self>, params: SwitchChainParams) -> Result<(), ProviderError> {
        self.guarded("switch_chain", async {
            let _guard = self.lifecycle.lock().await;
            self.switch_chain_locked(params).await
        })
        .await
    }

    async fn switch_chain_locked(
        self: &Arc<Self>,
        params: SwitchChainParams,
    ) -> Result<(), ProviderError> {
        let target = canonical_chain_id(&params.chain_id)
            .map_err(|_| ProviderError::ChainNotFound(params.chain_id.clone()))?;
        let previous = self.base.chain_id()?;
        if previous.as_chain() == Some(target.as_str()) {
            tracing::debug!(chain_id = %target, "already on requested chain");
            return Ok(());
        }
        let capability = self
            .base
            .capability()?
            .ok_or(ProviderError::ProviderNotInitialized("no signing capability stored"))?;
        let chain = self.base.get_chain(&target)?;
        if chain.chain_namespace != ChainNamespace::Eip155 {
            return Err(ProviderError::IncompatibleChainNamespace(chain.chain_namespace));
        }

        let previous_engine = self.base.proxy().current()?;
        tracing::info!(from = %previous, to = %target, "switching chain");
        self.base.transition(ProviderAction::BeginSwitch)?;
        self.base.update(ProviderStatePatch::chain_id(ChainIdState::Loading))?;

        let err = match self.setup_locked(capability, &target).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        tracing::warn!(to = %target, error = %err, "chain switch failed");

        match (self.config.rollback_on_failed_switch, previous, previous_engine) {
            (true, ChainIdState::Chain(previous_id), Some(engine)) => {
                self.base.proxy().restore(engine)?;
                self.base
                    .update(ProviderStatePatch::chain_id(ChainIdState::Chain(previous_id.clone())))?;
                self.base.transition(ProviderAction::SwitchRolledBack)?;
                tracing::info!(chain_id = %previous_id, "restored previous chain after failed switch");
            }
            _ => {
                self.base.transition(ProviderAction::SwitchFailed)?;
            }
        }
        Err(err)
    }

    async fn add_chain(&self, config: ChainConfig) -> Result<(), ProviderError> {
        self.guarded("add_chain", async {
            let _guard = self.lifecycle.lock().await;
            if !self.base.add_chain(config)? {
                tracing::debug!("add_chain ignored for known chain id");
            }
            Ok(())
        })
        .await
    }

    async fn lookup_network(&self, chain_id: &str) -> Result<u64, ProviderError> {
        if chain_id.trim().is_empty() {
            return Err(ProviderError::MissingParams("chainId"));
        }
        let expected = parse_chain_id(chain_id)?;
        let version = self
            .base
            .request("net_version", json!([]))
            .await
            .map_err(|e| match e {
                ProviderError::ProviderNotInitialized(_) | ProviderError::Cancelled(_) => e,
                other => ProviderError::ChainDisconnected(format!("net_version failed: {other}")),
            })?;
        let reported = match &version {
            Value::String(s) => parse_chain_id(s).ok(),
            Value::Number(n) => n.as_u64(),
            _ => None,
        }
        .ok_or_else(|| {
            ProviderError::ChainDisconnected(format!("unparseable net_version result: {version}"))
        })?;
        if reported != expected {
            return Err(ProviderError::ChainDisconnected(format!(
                "rpc reports network {reported}, expected {expected}"
            )));
        }
        tracing::debug!(chain_id = expected, "network lookup passed");
        Ok(reported)
    }
}

/// Handler side of the chain-switch and account middlewares. Holds the provider
/// weakly; the provider owns the pipeline that owns these handlers.
struct ProviderHandlers {
    inner: Weak<ProviderInner>,
}

impl ProviderHandlers {
    fn provider(&self) -> Result<Arc<ProviderInner>, ProviderError> {
        self.inner
            .upgrade()
            .ok_or(ProviderError::ProviderNotInitialized("provider dropped"))
    }
}

#[async_trait]
impl SwitchChainHandler for ProviderHandlers {
    async fn switch_chain(&self, params: SwitchChainParams) -> Result<(), ProviderError> {
        self.provider()?.switch_chain(params).await
    }
}

#[async_trait]
impl AddChainHandler for ProviderHandlers {
    async fn add_chain(&self, config: ChainConfig) -> Result<(), ProviderError> {
        self.provider()?.add_chain(config).await
    }
}

#[async_trait]
impl AccountUpdateHandler for ProviderHandlers {
    async fn update_account(&self, capability: SharedCapability) -> Result<(), ProviderError> {
        self.provider()?.update_account(capability).await
    }
}
