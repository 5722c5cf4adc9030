//! Notification side effect.

use std::sync::Arc;

use async_trait::async_trait;
use chronicle_core::error::DomainError;
use chronicle_core::event::StoredEvent;
use chronicle_core::handler::{DispatchMode, EventHandler, HandlerRole};
use chronicle_core::notification::Notifier;
use tracing::{debug, info};

/// Forwards live events to a `Notifier`. Replayed events never reach it.
pub struct NotificationHandler {
    notifier: Arc<dyn Notifier>,
}

impl NotificationHandler {
    /// Creates a handler that forwards to `notifier`.
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl EventHandler for NotificationHandler {
    fn name(&self) -> &'static str {
        "notification"
    }

    fn role(&self) -> HandlerRole {
        HandlerRole::SideEffect
    }

    async fn handle(&self, event: &StoredEvent, mode: DispatchMode) -> Result<(), DomainError> {
        if mode.is_replay() {
            debug!(event_id = %event.event_id, "notification suppressed for replay");
            return Ok(());
        }
        self.notifier.notify(event).await
    }
}

/// Notifier that only logs. Used when no external channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: &StoredEvent) -> Result<(), DomainError> {
        info!(
            event_id = %event.event_id,
            entity_id = %event.entity_id,
            event_type = %event.event_type,
            actor = %event.actor,
            "notification"
        );
        Ok(())
    }
}
