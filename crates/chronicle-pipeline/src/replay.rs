//! Replay coordinator: re-drive stored events through the publisher with
//! side effects suppressed.
//!
//! Replay is read-only with respect to the log. Each event is checked
//! against the entity's running sequence before it is dispatched, so a gap
//! halts the entity with its state at the last contiguous event and the
//! handlers never see anything past it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chronicle_core::aggregate::Aggregate;
use chronicle_core::error::DomainError;
use chronicle_core::handler::DispatchMode;
use chronicle_core::id::EntityId;
use chronicle_core::projector::{Projection, apply_stored};
use chronicle_core::repository::{EventLog, check_append_batch};
use tracing::{debug, info, instrument, warn};

use crate::locks::EntityLocks;
use crate::publisher::EventPublisher;

/// How far into an entity's history to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayTarget {
    /// Every stored event.
    Latest,
    /// Events up to and including this sequence.
    Sequence(i64),
    /// Events that occurred at or before this instant.
    AsOf(DateTime<Utc>),
}

/// An entity whose replay stopped early.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaltedEntity {
    /// The entity.
    pub entity_id: EntityId,
    /// Last sequence dispatched before the halt.
    pub last_sequence: i64,
    /// The fatal error that stopped it.
    pub reason: String,
}

/// Result of `ReplayCoordinator::replay_all`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Events dispatched in replay mode.
    pub events_replayed: usize,
    /// Distinct entities encountered.
    pub entities: usize,
    /// Highest log position read; pass it back to resume.
    pub last_position: i64,
    /// Entities whose replay stopped at a fatal error.
    pub halted: Vec<HaltedEntity>,
}

/// Replays events from the log through the publisher.
pub struct ReplayCoordinator {
    log: Arc<dyn EventLog>,
    publisher: Arc<EventPublisher>,
    locks: Arc<EntityLocks>,
    page_size: usize,
}

impl ReplayCoordinator {
    /// Creates a coordinator that reads the log in pages of 500 events.
    #[must_use]
    pub fn new(
        log: Arc<dyn EventLog>,
        publisher: Arc<EventPublisher>,
        locks: Arc<EntityLocks>,
    ) -> Self {
        Self {
            log,
            publisher,
            locks,
            page_size: 500,
        }
    }

    /// Sets how many events `replay_all` reads per page.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Replays an entity's full history and returns the reconstructed state.
    ///
    /// # Errors
    ///
    /// See [`ReplayCoordinator::replay_entity_to`].
    pub async fn replay_entity<A: Aggregate>(
        &self,
        entity_id: &EntityId,
    ) -> Result<Projection<A>, DomainError> {
        self.replay_entity_to(entity_id, ReplayTarget::Latest).await
    }

    /// Replays an entity's history up to `target` and returns the state at
    /// that point.
    ///
    /// # Errors
    ///
    /// - `DomainError::EntityNotFound` if no event falls within the target.
    /// - `DomainError::DomainRuleViolation` for a sequence target below 1.
    /// - `DomainError::SequenceGap` or `DomainError::UnknownEventType` if the
    ///   history is corrupt; events before the faulty one have already been
    ///   dispatched.
    /// - Any error of a failing state-projection handler.
    #[instrument(skip(self), fields(entity_id = %entity_id, entity_type = A::ENTITY_TYPE))]
    pub async fn replay_entity_to<A: Aggregate>(
        &self,
        entity_id: &EntityId,
        target: ReplayTarget,
    ) -> Result<Projection<A>, DomainError> {
        if let ReplayTarget::Sequence(n) = target {
            if n < 1 {
                return Err(DomainError::DomainRuleViolation(format!(
                    "replay target sequence must be at least 1, got {n}"
                )));
            }
        }

        let _guard = self.locks.acquire(entity_id).await?;
        let history = self.log.read_events(entity_id, 1).await?;
        let selected: Vec<_> = history
            .iter()
            .take_while(|event| match target {
                ReplayTarget::Latest => true,
                ReplayTarget::Sequence(n) => event.sequence <= n,
                ReplayTarget::AsOf(at) => event.occurred_at <= at,
            })
            .collect();
        if selected.is_empty() {
            return Err(DomainError::EntityNotFound(entity_id.clone()));
        }

        let mut projection = Projection::<A>::initial(entity_id.clone());
        for event in selected {
            projection = apply_stored(projection, event).inspect_err(|e| {
                warn!(error = %e, "replay halted");
            })?;
            self.publisher.publish(event, DispatchMode::Replay).await?;
        }

        info!(sequence = projection.sequence, "entity replayed");
        Ok(projection)
    }

    /// Replays every event with `position > since_position`, in log order.
    ///
    /// An entity whose events are not contiguous, or whose state projection
    /// fails fatally, is halted on its own and listed in the summary; other
    /// entities continue. With a non-zero `since_position`, the first event
    /// read for an entity sets the baseline its successors are checked
    /// against. When an entity's sequence jumps, its stream is re-read before
    /// a gap is declared, and events found there are replayed first.
    ///
    /// Payloads are not decoded here. Unknown event types only halt an
    /// entity if the publisher has a `StateProjection` handler that folds
    /// them; use `replay_entity` to verify a stream without one.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the log cannot be read, an entity lock cannot
    /// be taken, or a state-projection handler fails with a non-fatal error.
    #[instrument(skip(self))]
    pub async fn replay_all(&self, since_position: i64) -> Result<ReplaySummary, DomainError> {
        let mut summary = ReplaySummary {
            last_position: since_position,
            ..ReplaySummary::default()
        };
        let mut watermarks: HashMap<EntityId, i64> = HashMap::new();
        let mut halted: BTreeMap<EntityId, HaltedEntity> = BTreeMap::new();
        if !self.publisher.has_state_projection() {
            warn!("no state projection registered; unknown event types will not halt replay");
        }

        loop {
            let page = self
                .log
                .read_all(summary.last_position, self.page_size)
                .await?;
            let Some(last) = page.last() else {
                break;
            };
            let page_end = last.position;

            for recorded in &page {
                let event = &recorded.event;
                if halted.contains_key(&event.entity_id) {
                    continue;
                }

                let previous = watermarks.get(&event.entity_id).copied().unwrap_or(
                    if since_position == 0 {
                        0
                    } else {
                        event.sequence - 1
                    },
                );

                let _guard = self.locks.acquire(&event.entity_id).await?;
                let mut batch = Vec::new();
                if event.sequence > previous + 1 {
                    // Appends can commit out of position order; the entity's
                    // own stream still holds events the page went past.
                    batch = self
                        .log
                        .read_events(&event.entity_id, previous + 1)
                        .await?
                        .into_iter()
                        .take_while(|e| e.sequence < event.sequence)
                        .collect();
                    if !batch.is_empty() {
                        debug!(
                            entity_id = %event.entity_id,
                            recovered = batch.len(),
                            "replaying events committed behind the read position"
                        );
                    }
                }
                batch.push(event.clone());
                if let Err(gap) = check_append_batch(&event.entity_id, previous, &batch) {
                    halt(&mut halted, &mut watermarks, event.entity_id.clone(), previous, &gap);
                    continue;
                }

                let mut last_sequence = previous;
                for stored in &batch {
                    match self.publisher.publish(stored, DispatchMode::Replay).await {
                        Ok(_) => {
                            last_sequence = stored.sequence;
                            watermarks.insert(stored.entity_id.clone(), last_sequence);
                            summary.events_replayed += 1;
                        }
                        Err(e) if e.is_fatal() => {
                            halt(
                                &mut halted,
                                &mut watermarks,
                                stored.entity_id.clone(),
                                last_sequence,
                                &e,
                            );
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
            }

            summary.last_position = page_end;
            if page.len() < self.page_size {
                break;
            }
        }

        summary.entities = watermarks.len();
        summary.halted = halted.into_values().collect();
        info!(
            events_replayed = summary.events_replayed,
            entities = summary.entities,
            halted = summary.halted.len(),
            last_position = summary.last_position,
            "replay complete"
        );
        Ok(summary)
    }
}

fn halt(
    halted: &mut BTreeMap<EntityId, HaltedEntity>,
    watermarks: &mut HashMap<EntityId, i64>,
    entity_id: EntityId,
    last_sequence: i64,
    error: &DomainError,
) {
    warn!(entity_id = %entity_id, last_sequence, error = %error, "replay halted for entity");
    watermarks.insert(entity_id.clone(), last_sequence);
    halted.insert(
        entity_id.clone(),
        HaltedEntity {
            entity_id,
            last_sequence,
            reason: error.to_string(),
        },
    );
}
