//! Command abstractions.

use uuid::Uuid;

use crate::id::EntityId;

/// Fields every command carries regardless of intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMetadata {
    /// The entity the command targets.
    pub entity_id: EntityId,
    /// Correlation ID to trace this command through its events.
    pub correlation_id: Uuid,
    /// Who issued the command; copied onto every resulting event.
    pub actor: String,
    /// The latest sequence the caller has observed, if it wants the command
    /// rejected when the entity moved on in the meantime.
    pub expected_sequence: Option<i64>,
}

impl CommandMetadata {
    /// Creates metadata without an optimistic concurrency expectation.
    #[must_use]
    pub fn new(entity_id: EntityId, correlation_id: Uuid, actor: impl Into<String>) -> Self {
        Self {
            entity_id,
            correlation_id,
            actor: actor.into(),
            expected_sequence: None,
        }
    }

    /// Sets the sequence the caller expects to be the latest.
    #[must_use]
    pub fn expecting(mut self, sequence: i64) -> Self {
        self.expected_sequence = Some(sequence);
        self
    }
}

/// Trait that all commands implement.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Returns the metadata shared by all commands.
    fn metadata(&self) -> &CommandMetadata;
}
