//! Domain error types.

use thiserror::Error;

use crate::id::EntityId;

/// Top-level error type for command handling, projection and replay.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A command targeted an entity that has no history.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on entity {entity_id}: expected sequence {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The entity that had the conflict.
        entity_id: EntityId,
        /// The sequence the caller expected to be the latest.
        expected: i64,
        /// The latest sequence actually stored.
        actual: i64,
    },

    /// A business invariant rejected the command.
    #[error("domain rule violation: {0}")]
    DomainRuleViolation(String),

    /// A stored event carries a type the projector does not know.
    #[error("unknown event type '{event_type}' for entity {entity_id}")]
    UnknownEventType {
        /// The entity whose fold was halted.
        entity_id: EntityId,
        /// The unrecognized discriminator.
        event_type: String,
    },

    /// An entity's event stream is not contiguous.
    #[error("sequence gap on entity {entity_id}: expected sequence {expected}, found {found}")]
    SequenceGap {
        /// The entity whose stream is broken.
        entity_id: EntityId,
        /// The sequence that should have come next.
        expected: i64,
        /// The sequence that was read instead.
        found: i64,
    },

    /// An event payload could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` for errors that threaten append order or projector
    /// determinism. These halt the fold or replay that raised them and are
    /// never contained by the publisher.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownEventType { .. } | Self::SequenceGap { .. } | Self::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
