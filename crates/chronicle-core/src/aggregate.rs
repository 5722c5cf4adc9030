//! Aggregate abstraction.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::command::Command;
use crate::error::DomainError;
use crate::event::EventPayload;
use crate::id::EntityId;

/// An entity whose state is a deterministic fold of its events.
///
/// `apply` is the projector step: it must depend only on the prior state and
/// the event, never on the clock, randomness or I/O, and it must be total
/// over `Self::Event`. Map-like state should use ordered collections so that
/// the serialized form of equal states is identical.
pub trait Aggregate:
    Clone + std::fmt::Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// The closed set of events this aggregate produces and consumes.
    type Event: EventPayload;

    /// The commands this aggregate decides on.
    type Command: Command;

    /// Aggregate type name recorded on every stored event.
    const ENTITY_TYPE: &'static str;

    /// The state before any event has been applied.
    fn initial(entity_id: &EntityId) -> Self;

    /// Returns the state after applying `event`.
    #[must_use]
    fn apply(self, event: &Self::Event) -> Self;

    /// Decides which events a command produces against the current state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EntityNotFound` when the command needs an
    /// existing entity and the state is initial, or
    /// `DomainError::DomainRuleViolation` when a business invariant fails.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, DomainError>;
}
