use std::sync::{Arc, Mutex, RwLock};

use serde_json::Value;

use crate::domain::{ProviderEvent, ProviderEventKind};
use crate::error::ProviderError;

pub type Listener = Arc<dyn Fn(&ProviderEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Journal {
    event_seq: u64,
    events: Vec<ProviderEvent>,
}

/// Synchronous event fan-out plus a sequence-numbered journal of everything emitted.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<(ListenerId, Option<ProviderEventKind>, Listener)>>,
    next_listener: Mutex<u64>,
    journal: Mutex<Journal>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for one event kind, or every kind when `kind` is `None`.
    pub fn on(
        &self,
        kind: Option<ProviderEventKind>,
        listener: Listener,
    ) -> Result<ListenerId, ProviderError> {
        let id = {
            let mut n = self
                .next_listener
                .lock()
                .map_err(|e| ProviderError::poisoned("listener id", e))?;
            *n += 1;
            ListenerId(*n)
        };
        self.listeners
            .write()
            .map_err(|e| ProviderError::poisoned("listeners", e))?
            .push((id, kind, listener));
        Ok(id)
    }

    pub fn off(&self, id: ListenerId) -> Result<bool, ProviderError> {
        let mut g = self
            .listeners
            .write()
            .map_err(|e| ProviderError::poisoned("listeners", e))?;
        let before = g.len();
        g.retain(|(lid, _, _)| *lid != id);
        Ok(g.len() != before)
    }

    pub fn emit(&self, kind: ProviderEventKind, data: Value) -> Result<ProviderEvent, ProviderError> {
        let event = {
            let mut g = self
                .journal
                .lock()
                .map_err(|e| ProviderError::poisoned("event journal", e))?;
            g.event_seq = g.event_seq.saturating_add(1);
            let event = ProviderEvent {
                sequence: g.event_seq,
                kind,
                data,
            };
            g.events.push(event.clone());
            event
        };

        // Listeners run outside the locks so they may call back into the provider.
        let targets: Vec<Listener> = self
            .listeners
            .read()
            .map_err(|e| ProviderError::poisoned("listeners", e))?
            .iter()
            .filter(|(_, k, _)| k.map_or(true, |k| k == kind))
            .map(|(_, _, l)| Arc::clone(l))
            .collect();
        tracing::debug!(event = kind.as_str(), sequence = event.sequence, "emitting provider event");
        for listener in targets {
            listener(&event);
        }
        Ok(event)
    }

    pub fn drain(&self) -> Result<Vec<ProviderEvent>, ProviderError> {
        let mut g = self
            .journal
            .lock()
            .map_err(|e| ProviderError::poisoned("event journal", e))?;
        Ok(std::mem::take(&mut g.events))
    }
}
