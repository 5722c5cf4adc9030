//! Event handler seam used by the publisher.
//!
//! Every handler receives the stored event and the dispatch mode. The mode
//! is context for one dispatch only; it is never stored with the event.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::event::StoredEvent;

/// Whether an event is being dispatched for the first time or re-driven
/// from the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchMode {
    /// First publication after a command appended the event.
    Live,
    /// Re-dispatch of a stored event by the replay coordinator.
    Replay,
}

impl DispatchMode {
    /// Returns `true` when side effects must be suppressed.
    #[must_use]
    pub fn is_replay(self) -> bool {
        matches!(self, Self::Replay)
    }
}

/// How the publisher treats a handler's failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerRole {
    /// Maintains state derived by the projector. A failure aborts the
    /// publish call and is returned to the caller.
    StateProjection,
    /// Audit, notification and other side channels. A failure is logged,
    /// reported, and the remaining handlers still run.
    SideEffect,
}

/// A subscriber registered with the event publisher.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Stable name used in logs and failure reports.
    fn name(&self) -> &str;

    /// Determines the failure policy applied to this handler.
    fn role(&self) -> HandlerRole;

    /// Handles one event. Side-effect handlers must do nothing when
    /// `mode.is_replay()`.
    async fn handle(&self, event: &StoredEvent, mode: DispatchMode) -> Result<(), DomainError>;
}
