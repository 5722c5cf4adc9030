//! Event publisher: ordered, synchronous fan-out to registered handlers.

use std::sync::Arc;

use chronicle_core::error::DomainError;
use chronicle_core::event::StoredEvent;
use chronicle_core::handler::{DispatchMode, EventHandler, HandlerRole};
use tracing::{error, warn};

/// A side-effect handler that failed during one publish call.
#[derive(Debug)]
pub struct HandlerFailure {
    /// The handler's registered name.
    pub handler: String,
    /// What it returned.
    pub error: DomainError,
}

/// Outcome of a publish call in which every state projection succeeded.
#[derive(Debug, Default)]
pub struct PublishReport {
    /// Side-effect handlers that failed; the rest of the chain still ran.
    pub failures: Vec<HandlerFailure>,
}

impl PublishReport {
    /// Returns `true` if every handler succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Names of the handlers that failed.
    #[must_use]
    pub fn failed_handlers(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.handler.clone()).collect()
    }
}

/// Dispatches events to a fixed list of handlers in registration order.
///
/// Handlers for one event run one after another, never concurrently, and
/// the next event is not dispatched until the call for the previous one
/// returns.
#[derive(Default)]
pub struct EventPublisher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("handlers", &self.handler_names())
            .finish()
    }
}

impl EventPublisher {
    /// Creates a publisher with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a handler to the dispatch order.
    #[must_use]
    pub fn with_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Appends a handler to the dispatch order.
    pub fn register(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    /// Registered handler names, in dispatch order.
    #[must_use]
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Returns `true` if any registered handler is a state projection.
    #[must_use]
    pub fn has_state_projection(&self) -> bool {
        self.handlers
            .iter()
            .any(|h| h.role() == HandlerRole::StateProjection)
    }

    /// Publishes one event to every handler.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing `StateProjection` handler;
    /// handlers after it are not invoked. Side-effect failures are logged and
    /// collected in the returned report instead.
    pub async fn publish(
        &self,
        event: &StoredEvent,
        mode: DispatchMode,
    ) -> Result<PublishReport, DomainError> {
        let mut report = PublishReport::default();
        for handler in &self.handlers {
            let Err(e) = handler.handle(event, mode).await else {
                continue;
            };
            match handler.role() {
                HandlerRole::StateProjection => {
                    error!(
                        handler = handler.name(),
                        event_id = %event.event_id,
                        entity_id = %event.entity_id,
                        sequence = event.sequence,
                        error = %e,
                        "state projection failed"
                    );
                    return Err(e);
                }
                HandlerRole::SideEffect => {
                    warn!(
                        handler = handler.name(),
                        event_id = %event.event_id,
                        entity_id = %event.entity_id,
                        error = %e,
                        "side-effect handler failed"
                    );
                    report.failures.push(HandlerFailure {
                        handler: handler.name().to_owned(),
                        error: e,
                    });
                }
            }
        }
        Ok(report)
    }
}
