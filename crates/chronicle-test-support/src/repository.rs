//! Test event logs: scripted `EventLog` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::error::DomainError;
use chronicle_core::event::{RecordedEvent, StoredEvent};
use chronicle_core::id::EntityId;
use chronicle_core::repository::EventLog;
use uuid::Uuid;

/// An event log that serves a fixed history exactly as given, without
/// validating it, and records every append.
///
/// Because it does not validate, it can stage a corrupted log (for example
/// an entity with sequences 1, 2 and 4) that a real store would refuse to
/// produce. Positions are the 1-based index into the scripted history.
#[derive(Debug)]
pub struct StaticEventLog {
    history: Vec<StoredEvent>,
    appended: Mutex<Vec<(EntityId, i64, Vec<StoredEvent>)>>,
    published: Mutex<Vec<Uuid>>,
}

impl StaticEventLog {
    /// Creates a log that serves `history`.
    #[must_use]
    pub fn new(history: Vec<StoredEvent>) -> Self {
        Self {
            history,
            appended: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
        }
    }

    /// Returns a snapshot of all `append_events` calls.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_events(&self) -> Vec<(EntityId, i64, Vec<StoredEvent>)> {
        self.appended.lock().unwrap().clone()
    }

    /// Returns every id passed to `mark_published`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published_ids(&self) -> Vec<Uuid> {
        self.published.lock().unwrap().clone()
    }

    fn recorded(&self) -> impl Iterator<Item = RecordedEvent> + '_ {
        self.history.iter().enumerate().map(|(i, event)| RecordedEvent {
            position: i64::try_from(i + 1).unwrap_or(i64::MAX),
            event: event.clone(),
        })
    }
}

#[async_trait]
impl EventLog for StaticEventLog {
    async fn read_events(
        &self,
        entity_id: &EntityId,
        from_sequence: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Ok(self
            .history
            .iter()
            .filter(|e| &e.entity_id == entity_id && e.sequence >= from_sequence)
            .cloned()
            .collect())
    }

    async fn append_events(
        &self,
        entity_id: &EntityId,
        expected_sequence: i64,
        events: &[StoredEvent],
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        self.appended
            .lock()
            .unwrap()
            .push((entity_id.clone(), expected_sequence, events.to_vec()));
        let base = i64::try_from(self.history.len()).unwrap_or(i64::MAX);
        Ok(events
            .iter()
            .zip(1..)
            .map(|(event, offset)| RecordedEvent {
                position: base + offset,
                event: event.clone(),
            })
            .collect())
    }

    async fn read_all(
        &self,
        after_position: i64,
        limit: usize,
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        Ok(self
            .recorded()
            .filter(|r| r.position > after_position)
            .take(limit)
            .collect())
    }

    async fn pending_publications(
        &self,
        _after_position: i64,
        _limit: usize,
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        Ok(vec![])
    }

    async fn pending_publications_for(
        &self,
        _entity_id: &EntityId,
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        Ok(vec![])
    }

    async fn mark_published(&self, event_ids: &[Uuid]) -> Result<(), DomainError> {
        self.published.lock().unwrap().extend_from_slice(event_ids);
        Ok(())
    }
}

/// An event log that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventLog;

fn refused() -> DomainError {
    DomainError::Infrastructure("connection refused".into())
}

#[async_trait]
impl EventLog for FailingEventLog {
    async fn read_events(
        &self,
        _entity_id: &EntityId,
        _from_sequence: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        Err(refused())
    }

    async fn append_events(
        &self,
        _entity_id: &EntityId,
        _expected_sequence: i64,
        _events: &[StoredEvent],
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        Err(refused())
    }

    async fn read_all(
        &self,
        _after_position: i64,
        _limit: usize,
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        Err(refused())
    }

    async fn pending_publications(
        &self,
        _after_position: i64,
        _limit: usize,
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        Err(refused())
    }

    async fn pending_publications_for(
        &self,
        _entity_id: &EntityId,
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        Err(refused())
    }

    async fn mark_published(&self, _event_ids: &[Uuid]) -> Result<(), DomainError> {
        Err(refused())
    }
}
