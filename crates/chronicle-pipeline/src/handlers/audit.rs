//! Audit sink: one forensic record per live event.

use std::sync::Arc;

use async_trait::async_trait;
use chronicle_core::audit::{AuditRecord, AuditStore};
use chronicle_core::clock::Clock;
use chronicle_core::error::DomainError;
use chronicle_core::event::StoredEvent;
use chronicle_core::handler::{DispatchMode, EventHandler, HandlerRole};
use chronicle_core::id::IdGenerator;
use tracing::debug;

/// Writes an `AuditRecord` for every live event and nothing during replay.
///
/// A redelivered live event (for example from the outbox relay) finds its
/// record already present and writes nothing.
pub struct AuditSink {
    store: Arc<dyn AuditStore>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl AuditSink {
    /// Creates an audit sink writing to `store`.
    #[must_use]
    pub fn new(store: Arc<dyn AuditStore>, clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self { store, clock, ids }
    }
}

#[async_trait]
impl EventHandler for AuditSink {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn role(&self) -> HandlerRole {
        HandlerRole::SideEffect
    }

    async fn handle(&self, event: &StoredEvent, mode: DispatchMode) -> Result<(), DomainError> {
        if mode.is_replay() {
            debug!(event_id = %event.event_id, "audit skipped for replay");
            return Ok(());
        }
        let record = AuditRecord::for_event(event, self.ids.next_id(), self.clock.now())?;
        if !self.store.insert(record).await? {
            debug!(event_id = %event.event_id, "audit record already present");
        }
        Ok(())
    }
}
