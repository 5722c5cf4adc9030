//! Event log abstraction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::{RecordedEvent, StoredEvent};
use crate::id::EntityId;

/// Append-only store of the canonical event history, with a publish outbox.
///
/// There is no update or delete operation. Implementations must make each
/// `append_events` call atomic and guarantee read-after-write consistency
/// for a single entity.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Loads events for an entity with `sequence >= from_sequence`, ordered
    /// by sequence.
    async fn read_events(
        &self,
        entity_id: &EntityId,
        from_sequence: i64,
    ) -> Result<Vec<StoredEvent>, DomainError>;

    /// Appends events to an entity stream with optimistic concurrency.
    ///
    /// `expected_sequence` is the latest sequence the caller folded. The
    /// append fails with `DomainError::ConcurrencyConflict` if the stored
    /// latest sequence differs. Appended events are recorded as pending
    /// publication in the same atomic step.
    async fn append_events(
        &self,
        entity_id: &EntityId,
        expected_sequence: i64,
        events: &[StoredEvent],
    ) -> Result<Vec<RecordedEvent>, DomainError>;

    /// Reads up to `limit` events across all entities with
    /// `position > after_position`, ordered by position.
    async fn read_all(
        &self,
        after_position: i64,
        limit: usize,
    ) -> Result<Vec<RecordedEvent>, DomainError>;

    /// Returns up to `limit` events with `position > after_position` that are
    /// not yet marked published, ordered by position.
    async fn pending_publications(
        &self,
        after_position: i64,
        limit: usize,
    ) -> Result<Vec<RecordedEvent>, DomainError>;

    /// Returns the unpublished events of one entity, ordered by position.
    async fn pending_publications_for(
        &self,
        entity_id: &EntityId,
    ) -> Result<Vec<RecordedEvent>, DomainError>;

    /// Marks events as delivered to every handler. Unknown ids are ignored.
    async fn mark_published(&self, event_ids: &[Uuid]) -> Result<(), DomainError>;
}

/// Validates that a batch continues an entity stream: every event belongs to
/// `entity_id` and sequences run `expected_sequence + 1, + 2, ...`.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` for a foreign event and
/// `DomainError::SequenceGap` for a non-contiguous sequence.
pub fn check_append_batch(
    entity_id: &EntityId,
    expected_sequence: i64,
    events: &[StoredEvent],
) -> Result<(), DomainError> {
    let mut next = expected_sequence + 1;
    for event in events {
        if &event.entity_id != entity_id {
            return Err(DomainError::Infrastructure(format!(
                "append batch for {entity_id} contains event {} of entity {}",
                event.event_id, event.entity_id
            )));
        }
        if event.sequence != next {
            return Err(DomainError::SequenceGap {
                entity_id: entity_id.clone(),
                expected: next,
                found: event.sequence,
            });
        }
        next += 1;
    }
    Ok(())
}
