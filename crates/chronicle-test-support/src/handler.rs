//! Test handlers: `EventHandler` implementations that record or fail.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chronicle_core::error::DomainError;
use chronicle_core::event::StoredEvent;
use chronicle_core::handler::{DispatchMode, EventHandler, HandlerRole};
use uuid::Uuid;

/// A handler that records every `(event_id, mode)` it receives.
#[derive(Debug)]
pub struct RecordingHandler {
    name: String,
    role: HandlerRole,
    received: Mutex<Vec<(Uuid, DispatchMode)>>,
}

impl RecordingHandler {
    /// Creates a recording handler with the given name and role.
    #[must_use]
    pub fn new(name: impl Into<String>, role: HandlerRole) -> Self {
        Self {
            name: name.into(),
            role,
            received: Mutex::new(Vec::new()),
        }
    }

    /// Returns every dispatch received, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn received(&self) -> Vec<(Uuid, DispatchMode)> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventHandler for RecordingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> HandlerRole {
        self.role
    }

    async fn handle(&self, event: &StoredEvent, mode: DispatchMode) -> Result<(), DomainError> {
        self.received.lock().unwrap().push((event.event_id, mode));
        Ok(())
    }
}

/// A handler that fails its first `failures` calls, then succeeds.
///
/// Use `FailingHandler::always` for a handler that never recovers.
#[derive(Debug)]
pub struct FailingHandler {
    name: String,
    role: HandlerRole,
    failures: usize,
    calls: AtomicUsize,
}

impl FailingHandler {
    /// Creates a handler that fails `failures` times before succeeding.
    #[must_use]
    pub fn new(name: impl Into<String>, role: HandlerRole, failures: usize) -> Self {
        Self {
            name: name.into(),
            role,
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a handler that fails on every call.
    #[must_use]
    pub fn always(name: impl Into<String>, role: HandlerRole) -> Self {
        Self::new(name, role, usize::MAX)
    }

    /// Returns how many times the handler was invoked.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventHandler for FailingHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> HandlerRole {
        self.role
    }

    async fn handle(&self, _event: &StoredEvent, _mode: DispatchMode) -> Result<(), DomainError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(DomainError::Infrastructure(format!(
                "{} failed on call {}",
                self.name,
                call + 1
            )));
        }
        Ok(())
    }
}
