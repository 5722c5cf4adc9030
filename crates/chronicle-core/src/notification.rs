//! Outbound notification seam.

use async_trait::async_trait;

use crate::error::DomainError;
use crate::event::StoredEvent;

/// External side effect triggered by live events (email, webhook, message
/// bus). Never invoked during replay.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends the notification for one event.
    async fn notify(&self, event: &StoredEvent) -> Result<(), DomainError>;
}
