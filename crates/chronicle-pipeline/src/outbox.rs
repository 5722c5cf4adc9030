//! Publication outbox relay.
//!
//! Every appended event is pending publication until the publisher has
//! dispatched it live and it has been marked published. The command
//! processor normally does this straight after the append; the relay picks
//! up whatever a crash or an exhausted retry left behind, in log order.

use std::collections::HashSet;
use std::sync::Arc;

use chronicle_core::error::DomainError;
use chronicle_core::event::RecordedEvent;
use chronicle_core::handler::DispatchMode;
use chronicle_core::id::EntityId;
use chronicle_core::repository::EventLog;
use tracing::{error, info, instrument, warn};

use crate::locks::EntityLocks;
use crate::publisher::{EventPublisher, PublishReport};
use crate::retry::RetryPolicy;

/// Publishes one event live, with retries, and marks it published.
///
/// A failure to mark the event is logged and not returned: the event has
/// been delivered, and a later redelivery is absorbed by idempotent
/// handlers.
pub(crate) async fn deliver(
    log: &dyn EventLog,
    publisher: &EventPublisher,
    retry: &RetryPolicy,
    recorded: &RecordedEvent,
) -> Result<PublishReport, DomainError> {
    let event = &recorded.event;
    let report = retry
        .run("publish", || publisher.publish(event, DispatchMode::Live))
        .await?;
    if let Err(e) = log.mark_published(&[event.event_id]).await {
        warn!(event_id = %event.event_id, error = %e, "failed to mark event published");
    }
    Ok(report)
}

/// Result of one `OutboxRelay::drain` call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RelayReport {
    /// Events published and marked.
    pub delivered: usize,
    /// Entities whose pending events could not be published; their later
    /// events were held back to keep per-entity order.
    pub blocked: Vec<EntityId>,
}

/// Re-publishes pending events.
pub struct OutboxRelay {
    log: Arc<dyn EventLog>,
    publisher: Arc<EventPublisher>,
    locks: Arc<EntityLocks>,
    retry: RetryPolicy,
    batch_size: usize,
}

impl OutboxRelay {
    /// Creates a relay reading `batch_size` pending events at a time.
    #[must_use]
    pub fn new(
        log: Arc<dyn EventLog>,
        publisher: Arc<EventPublisher>,
        locks: Arc<EntityLocks>,
        retry: RetryPolicy,
        batch_size: usize,
    ) -> Self {
        Self {
            log,
            publisher,
            locks,
            retry,
            batch_size: batch_size.max(1),
        }
    }

    /// Publishes pending events until none are left or only blocked
    /// entities remain.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the outbox cannot be read or an entity lock
    /// cannot be taken. Publication failures block their entity instead.
    #[instrument(skip(self), fields(batch_size = self.batch_size))]
    pub async fn drain(&self) -> Result<RelayReport, DomainError> {
        let mut report = RelayReport::default();
        let mut blocked: HashSet<EntityId> = HashSet::new();
        let mut cursor = 0;

        loop {
            let batch = self
                .log
                .pending_publications(cursor, self.batch_size)
                .await?;
            let Some(last) = batch.last() else {
                break;
            };
            // Blocked entities keep their pending rows; page past them.
            cursor = last.position;

            for recorded in &batch {
                let entity_id = &recorded.event.entity_id;
                if blocked.contains(entity_id) {
                    continue;
                }

                let _guard = self.locks.acquire(entity_id).await?;
                // The command processor may have delivered it while we waited.
                let still_pending = self
                    .log
                    .pending_publications_for(entity_id)
                    .await?
                    .iter()
                    .any(|r| r.event.event_id == recorded.event.event_id);
                if !still_pending {
                    continue;
                }

                match deliver(self.log.as_ref(), &self.publisher, &self.retry, recorded).await {
                    Ok(_) => report.delivered += 1,
                    Err(e) => {
                        error!(
                            entity_id = %entity_id,
                            event_id = %recorded.event.event_id,
                            sequence = recorded.event.sequence,
                            error = %e,
                            "publication still failing; entity blocked"
                        );
                        blocked.insert(entity_id.clone());
                    }
                }
            }

            if batch.len() < self.batch_size {
                break;
            }
        }

        let mut blocked: Vec<EntityId> = blocked.into_iter().collect();
        blocked.sort();
        report.blocked = blocked;
        if report.delivered > 0 || !report.blocked.is_empty() {
            info!(
                delivered = report.delivered,
                blocked = report.blocked.len(),
                "outbox drained"
            );
        }
        Ok(report)
    }
}
