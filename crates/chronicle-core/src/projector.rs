//! Entity projector: folds stored events into aggregate state.
//!
//! The same functions serve the write path (loading current state before a
//! command) and replay, so both observe identical state for identical
//! history.

use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::event::{EventPayload, StoredEvent};
use crate::id::EntityId;

/// Aggregate state together with the last sequence folded into it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "A: Aggregate")]
pub struct Projection<A> {
    /// The entity this state belongs to.
    pub entity_id: EntityId,
    /// The last applied sequence; 0 before any event.
    pub sequence: i64,
    /// The materialized state.
    pub state: A,
}

impl<A: Aggregate> Projection<A> {
    /// The projection of an entity with no history.
    #[must_use]
    pub fn initial(entity_id: EntityId) -> Self {
        let state = A::initial(&entity_id);
        Self {
            entity_id,
            sequence: 0,
            state,
        }
    }

    /// Returns `true` if no event has been applied.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.sequence == 0
    }
}

/// Applies one stored event to a projection.
///
/// # Errors
///
/// - `DomainError::SequenceGap` if `stored.sequence` is not exactly one past
///   the projection's sequence.
/// - `DomainError::UnknownEventType` if the event type is not part of
///   `A::Event`.
/// - `DomainError::Serialization` if the payload does not decode.
/// - `DomainError::Infrastructure` if the event belongs to another entity or
///   aggregate type.
pub fn apply_stored<A: Aggregate>(
    projection: Projection<A>,
    stored: &StoredEvent,
) -> Result<Projection<A>, DomainError> {
    if stored.entity_id != projection.entity_id {
        return Err(DomainError::Infrastructure(format!(
            "event {} belongs to entity {}, not {}",
            stored.event_id, stored.entity_id, projection.entity_id
        )));
    }
    if stored.entity_type != A::ENTITY_TYPE {
        return Err(DomainError::Infrastructure(format!(
            "event {} has entity type '{}', expected '{}'",
            stored.event_id,
            stored.entity_type,
            A::ENTITY_TYPE
        )));
    }

    let expected = projection.sequence + 1;
    if stored.sequence != expected {
        return Err(DomainError::SequenceGap {
            entity_id: projection.entity_id,
            expected,
            found: stored.sequence,
        });
    }

    let event = A::Event::from_stored(stored)?;
    Ok(Projection {
        entity_id: projection.entity_id,
        sequence: stored.sequence,
        state: projection.state.apply(&event),
    })
}

/// Folds a full history, starting from the initial state.
///
/// # Errors
///
/// Returns the first error raised by [`apply_stored`]; nothing after the
/// failing event is applied.
pub fn fold<A: Aggregate>(
    entity_id: &EntityId,
    events: &[StoredEvent],
) -> Result<Projection<A>, DomainError> {
    fold_from(Projection::initial(entity_id.clone()), events)
}

/// Folds the tail of a history onto an existing projection (e.g. a
/// snapshot).
///
/// # Errors
///
/// Returns the first error raised by [`apply_stored`].
pub fn fold_from<A: Aggregate>(
    start: Projection<A>,
    events: &[StoredEvent],
) -> Result<Projection<A>, DomainError> {
    events.iter().try_fold(start, apply_stored)
}
