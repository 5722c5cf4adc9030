//! In-memory event log and audit store.
//!
//! Both honour the same contracts as the PostgreSQL implementations:
//! atomic optimistic appends, gap-free sequences, an outbox per event and
//! at most one audit record per event.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, RwLock};

use async_trait::async_trait;
use chronicle_core::audit::{AuditRecord, AuditStore};
use chronicle_core::error::DomainError;
use chronicle_core::event::{RecordedEvent, StoredEvent};
use chronicle_core::id::EntityId;
use chronicle_core::repository::{EventLog, check_append_batch};
use uuid::Uuid;

fn poisoned() -> DomainError {
    DomainError::Infrastructure("lock poisoned".into())
}

#[derive(Debug, Default)]
struct LogState {
    /// All events; `log[i].position == i + 1`.
    log: Vec<RecordedEvent>,
    /// Indices into `log` per entity, in sequence order.
    streams: HashMap<EntityId, Vec<usize>>,
    event_ids: HashSet<Uuid>,
    published: HashSet<Uuid>,
}

impl LogState {
    fn latest_sequence(&self, entity_id: &EntityId) -> i64 {
        self.streams
            .get(entity_id)
            .and_then(|indices| indices.last())
            .map_or(0, |&i| self.log[i].event.sequence)
    }

    fn is_pending(&self, recorded: &RecordedEvent) -> bool {
        !self.published.contains(&recorded.event.event_id)
    }
}

/// Append-only event log held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    state: RwLock<LogState>,
}

impl InMemoryEventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn read_events(
        &self,
        entity_id: &EntityId,
        from_sequence: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .streams
            .get(entity_id)
            .into_iter()
            .flatten()
            .map(|&i| &state.log[i].event)
            .filter(|e| e.sequence >= from_sequence)
            .cloned()
            .collect())
    }

    async fn append_events(
        &self,
        entity_id: &EntityId,
        expected_sequence: i64,
        events: &[StoredEvent],
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        check_append_batch(entity_id, expected_sequence, events)?;

        let mut state = self.state.write().map_err(|_| poisoned())?;
        let actual = state.latest_sequence(entity_id);
        if actual != expected_sequence {
            return Err(DomainError::ConcurrencyConflict {
                entity_id: entity_id.clone(),
                expected: expected_sequence,
                actual,
            });
        }
        if let Some(duplicate) = events.iter().find(|e| state.event_ids.contains(&e.event_id)) {
            return Err(DomainError::Infrastructure(format!(
                "event {} is already in the log",
                duplicate.event_id
            )));
        }

        let mut committed = Vec::with_capacity(events.len());
        for event in events {
            let index = state.log.len();
            let recorded = RecordedEvent {
                position: i64::try_from(index + 1)
                    .map_err(|e| DomainError::Infrastructure(format!("log position overflow: {e}")))?,
                event: event.clone(),
            };
            state.event_ids.insert(event.event_id);
            state.log.push(recorded.clone());
            state.streams.entry(entity_id.clone()).or_default().push(index);
            committed.push(recorded);
        }
        Ok(committed)
    }

    async fn read_all(
        &self,
        after_position: i64,
        limit: usize,
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let start = usize::try_from(after_position.max(0)).unwrap_or(usize::MAX);
        Ok(state.log.iter().skip(start).take(limit).cloned().collect())
    }

    async fn pending_publications(
        &self,
        after_position: i64,
        limit: usize,
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let start = usize::try_from(after_position.max(0)).unwrap_or(usize::MAX);
        Ok(state
            .log
            .iter()
            .skip(start)
            .filter(|r| state.is_pending(r))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn pending_publications_for(
        &self,
        entity_id: &EntityId,
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .streams
            .get(entity_id)
            .into_iter()
            .flatten()
            .map(|&i| &state.log[i])
            .filter(|r| state.is_pending(r))
            .cloned()
            .collect())
    }

    async fn mark_published(&self, event_ids: &[Uuid]) -> Result<(), DomainError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        for id in event_ids {
            if state.event_ids.contains(id) {
                state.published.insert(*id);
            }
        }
        Ok(())
    }
}

/// Audit store held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditStore {
    /// Creates an empty audit store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every record, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the lock is poisoned.
    pub fn all(&self) -> Result<Vec<AuditRecord>, DomainError> {
        Ok(self.records.lock().map_err(|_| poisoned())?.clone())
    }

    /// Counts the records written for one event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the lock is poisoned.
    pub fn count_for_event(&self, event_id: Uuid) -> Result<usize, DomainError> {
        let records = self.records.lock().map_err(|_| poisoned())?;
        Ok(records.iter().filter(|r| r.event_id == event_id).count())
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn insert(&self, record: AuditRecord) -> Result<bool, DomainError> {
        let mut records = self.records.lock().map_err(|_| poisoned())?;
        if records.iter().any(|r| r.event_id == record.event_id) {
            return Ok(false);
        }
        records.push(record);
        Ok(true)
    }

    async fn records_for_entity(
        &self,
        entity_id: &EntityId,
    ) -> Result<Vec<AuditRecord>, DomainError> {
        let records = self.records.lock().map_err(|_| poisoned())?;
        Ok(records
            .iter()
            .filter(|r| &r.entity_id == entity_id)
            .cloned()
            .collect())
    }
}
