//! Per-entity mutual exclusion.
//!
//! Commands, replays and outbox deliveries for the same entity take the same
//! lock, so a fold never observes a live append half-way through. Different
//! entities never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chronicle_core::error::DomainError;
use chronicle_core::id::EntityId;
use tokio::sync::OwnedMutexGuard;

/// Idle locks are pruned once the table grows past this many entries.
const PRUNE_THRESHOLD: usize = 1024;

/// Held for the duration of one unit of work on an entity.
pub type EntityGuard = OwnedMutexGuard<()>;

/// Table of async mutexes keyed by entity.
#[derive(Debug, Default)]
pub struct EntityLocks {
    table: Mutex<HashMap<EntityId, Arc<tokio::sync::Mutex<()>>>>,
}

impl EntityLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `entity_id`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the lock table is poisoned.
    pub async fn acquire(&self, entity_id: &EntityId) -> Result<EntityGuard, DomainError> {
        let lock = {
            let mut table = self
                .table
                .lock()
                .map_err(|_| DomainError::Infrastructure("entity lock table poisoned".into()))?;
            if table.len() > PRUNE_THRESHOLD {
                table.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(table.entry(entity_id.clone()).or_default())
        };
        Ok(lock.lock_owned().await)
    }
}
