use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use crate::engine::{Engine, JsonRpcRequest};
use crate::error::ProviderError;

/// A pipeline together with the generation it was installed under.
#[derive(Debug)]
pub struct InstalledEngine {
    pub generation: u64,
    pub engine: Engine,
}

#[derive(Debug, Default)]
struct ProxyCell {
    generation: u64,
    current: Option<Arc<InstalledEngine>>,
}

/// Indirection cell in front of the active pipeline.
///
/// Each dispatch snapshots the installed engine before awaiting, so requests
/// already in flight finish on the pipeline they started on while later
/// requests observe the replacement.
#[derive(Debug, Clone, Default)]
pub struct EngineProxy {
    cell: Arc<RwLock<ProxyCell>>,
    next_id: Arc<AtomicU64>,
}

impl EngineProxy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, engine: Engine) -> Result<Arc<InstalledEngine>, ProviderError> {
        let mut g = self
            .cell
            .write()
            .map_err(|e| ProviderError::poisoned("engine proxy", e))?;
        g.generation = g.generation.saturating_add(1);
        let installed = Arc::new(InstalledEngine {
            generation: g.generation,
            engine,
        });
        g.current = Some(Arc::clone(&installed));
        tracing::debug!(generation = installed.generation, "installed provider engine");
        Ok(installed)
    }

    /// Puts a previously installed pipeline back without minting a new generation.
    pub fn restore(&self, installed: Arc<InstalledEngine>) -> Result<(), ProviderError> {
        let mut g = self
            .cell
            .write()
            .map_err(|e| ProviderError::poisoned("engine proxy", e))?;
        tracing::debug!(generation = installed.generation, "restored provider engine");
        g.current = Some(installed);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), ProviderError> {
        let mut g = self
            .cell
            .write()
            .map_err(|e| ProviderError::poisoned("engine proxy", e))?;
        g.current = None;
        Ok(())
    }

    pub fn current(&self) -> Result<Option<Arc<InstalledEngine>>, ProviderError> {
        let g = self
            .cell
            .read()
            .map_err(|e| ProviderError::poisoned("engine proxy", e))?;
        Ok(g.current.clone())
    }

    /// Generation of the installed pipeline, `None` when nothing is installed.
    pub fn generation(&self) -> Result<Option<u64>, ProviderError> {
        Ok(self.current()?.map(|installed| installed.generation))
    }

    pub fn is_installed(&self) -> Result<bool, ProviderError> {
        Ok(self.current()?.is_some())
    }

    pub async fn dispatch(&self, req: &mut JsonRpcRequest) -> Result<Value, ProviderError> {
        let installed = self
            .current()?
            .ok_or(ProviderError::ProviderNotInitialized("no engine installed"))?;
        if req.id.is_null() {
            req.id = Value::from(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        }
        tracing::trace!(
            generation = installed.generation,
            method = %req.method,
            "dispatching request"
        );
        installed.engine.handle(req).await
    }

    pub async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let mut req = JsonRpcRequest::new(method, params);
        self.dispatch(&mut req).await
    }
}
