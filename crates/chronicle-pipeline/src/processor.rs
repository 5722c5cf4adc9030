//! Command processor: load, decide, append, publish.

use std::sync::Arc;

use chronicle_core::aggregate::Aggregate;
use chronicle_core::clock::Clock;
use chronicle_core::command::Command;
use chronicle_core::error::DomainError;
use chronicle_core::event::{EventPayload, RecordedEvent, StoredEvent};
use chronicle_core::id::{EntityId, IdGenerator};
use chronicle_core::projector::{Projection, fold_from};
use chronicle_core::repository::EventLog;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::handlers::snapshot::SnapshotStore;
use crate::locks::EntityLocks;
use crate::outbox::deliver;
use crate::publisher::EventPublisher;
use crate::retry::RetryPolicy;

/// Whether the events of a command reached the publisher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicationStatus {
    /// Every event was dispatched live and marked published. Side-effect
    /// handlers that failed along the way are named.
    Delivered {
        /// Names of side-effect handlers that failed for at least one event.
        failed_handlers: Vec<String>,
    },
    /// The events are durable but publication did not complete. They stay
    /// in the outbox for the relay.
    Deferred {
        /// How many of the entity's events remain unpublished.
        pending: usize,
        /// Why publication stopped.
        reason: String,
    },
}

/// The result of a successfully applied command.
#[derive(Debug, Clone)]
pub struct CommandOutcome<A> {
    /// The entity the command targeted.
    pub entity_id: EntityId,
    /// The entity's sequence watermark after the command.
    pub sequence: i64,
    /// The entity's state after the command.
    pub state: A,
    /// The events the command appended, with their log positions.
    pub events: Vec<RecordedEvent>,
    /// Publication result for those events.
    pub publication: PublicationStatus,
}

/// Applies commands for one aggregate type.
///
/// Each `process` call holds the entity's lock from load to publication, so
/// commands for one entity are serialized while different entities proceed
/// concurrently. The event log re-checks the expected sequence on append,
/// which also covers processors running in other processes.
pub struct CommandProcessor<A: Aggregate> {
    log: Arc<dyn EventLog>,
    publisher: Arc<EventPublisher>,
    locks: Arc<EntityLocks>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    snapshots: Option<Arc<SnapshotStore<A>>>,
    retry: RetryPolicy,
}

impl<A: Aggregate> CommandProcessor<A> {
    /// Creates a processor without a snapshot cache and with the default
    /// retry policy.
    #[must_use]
    pub fn new(
        log: Arc<dyn EventLog>,
        publisher: Arc<EventPublisher>,
        locks: Arc<EntityLocks>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            log,
            publisher,
            locks,
            clock,
            ids,
            snapshots: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Loads state from `snapshots` plus the tail of the log.
    #[must_use]
    pub fn with_snapshots(mut self, snapshots: Arc<SnapshotStore<A>>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Sets the retry policy for publication.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Handles a command.
    ///
    /// # Errors
    ///
    /// - `DomainError::ConcurrencyConflict` if the command's expected
    ///   sequence is stale or another writer appended first.
    /// - `DomainError::EntityNotFound` / `DomainError::DomainRuleViolation`
    ///   from the aggregate.
    /// - `DomainError::UnknownEventType`, `DomainError::SequenceGap` or
    ///   `DomainError::Serialization` if the stored history cannot be folded.
    /// - `DomainError::Infrastructure` if the log cannot be read or written.
    ///
    /// Publication failures after a successful append are not errors; they
    /// are reported as `PublicationStatus::Deferred`.
    #[instrument(
        skip(self, command),
        fields(
            entity_id = %command.metadata().entity_id,
            command_type = command.command_type(),
            correlation_id = %command.metadata().correlation_id,
        )
    )]
    pub async fn process(&self, command: &A::Command) -> Result<CommandOutcome<A>, DomainError> {
        let metadata = command.metadata();
        let entity_id = &metadata.entity_id;
        let _guard = self.locks.acquire(entity_id).await?;

        let current = self.load(entity_id).await?;
        if let Some(expected) = metadata.expected_sequence {
            if expected != current.sequence {
                return Err(DomainError::ConcurrencyConflict {
                    entity_id: entity_id.clone(),
                    expected,
                    actual: current.sequence,
                });
            }
        }

        let decided = current.state.handle(command)?;
        if decided.is_empty() {
            return Ok(CommandOutcome {
                entity_id: entity_id.clone(),
                sequence: current.sequence,
                state: current.state,
                events: vec![],
                publication: PublicationStatus::Delivered {
                    failed_handlers: vec![],
                },
            });
        }

        let stored = self.to_stored_events(command, current.sequence, &decided)?;
        let expected_sequence = current.sequence;
        let next = fold_from(current, &stored)?;

        let earlier = self.log.pending_publications_for(entity_id).await?;
        let committed = self
            .log
            .append_events(entity_id, expected_sequence, &stored)
            .await?;
        info!(
            sequence = next.sequence,
            events = committed.len(),
            "command committed"
        );

        let to_publish: Vec<RecordedEvent> = earlier
            .into_iter()
            .chain(committed.iter().cloned())
            .collect();
        let publication = self.publish_in_order(&to_publish).await;

        Ok(CommandOutcome {
            entity_id: next.entity_id,
            sequence: next.sequence,
            state: next.state,
            events: committed,
            publication,
        })
    }

    /// Folds the current state of an entity: cached snapshot plus the tail
    /// of the log, or the full history.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the log cannot be read or folded.
    pub async fn load(&self, entity_id: &EntityId) -> Result<Projection<A>, DomainError> {
        let start = match &self.snapshots {
            Some(snapshots) => snapshots.get(entity_id)?,
            None => None,
        }
        .unwrap_or_else(|| Projection::initial(entity_id.clone()));

        let tail = self.log.read_events(entity_id, start.sequence + 1).await?;
        let projection = fold_from(start, &tail)?;
        if let Some(snapshots) = &self.snapshots {
            snapshots.put(projection.clone())?;
        }
        Ok(projection)
    }

    fn to_stored_events(
        &self,
        command: &A::Command,
        after_sequence: i64,
        events: &[A::Event],
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let metadata = command.metadata();
        let occurred_at = self.clock.now();
        let mut causation_id = metadata.correlation_id;
        let mut sequence = after_sequence;

        events
            .iter()
            .map(|event| {
                sequence += 1;
                let event_id: Uuid = self.ids.next_id();
                let stored = StoredEvent {
                    event_id,
                    entity_id: metadata.entity_id.clone(),
                    entity_type: A::ENTITY_TYPE.to_owned(),
                    event_type: event.event_type().to_owned(),
                    payload: event.to_payload()?,
                    sequence,
                    correlation_id: metadata.correlation_id,
                    causation_id,
                    actor: metadata.actor.clone(),
                    occurred_at,
                };
                causation_id = event_id;
                Ok(stored)
            })
            .collect()
    }

    /// Publishes events in order, stopping at the first one that cannot be
    /// delivered so later events never overtake it.
    async fn publish_in_order(&self, events: &[RecordedEvent]) -> PublicationStatus {
        let mut failed_handlers: Vec<String> = Vec::new();
        for (index, recorded) in events.iter().enumerate() {
            match deliver(self.log.as_ref(), &self.publisher, &self.retry, recorded).await {
                Ok(report) => {
                    for name in report.failed_handlers() {
                        if !failed_handlers.contains(&name) {
                            failed_handlers.push(name);
                        }
                    }
                }
                Err(e) => {
                    error!(
                        event_id = %recorded.event.event_id,
                        sequence = recorded.event.sequence,
                        error = %e,
                        "publication deferred to the outbox"
                    );
                    return PublicationStatus::Deferred {
                        pending: events.len() - index,
                        reason: e.to_string(),
                    };
                }
            }
        }
        PublicationStatus::Delivered { failed_handlers }
    }
}
