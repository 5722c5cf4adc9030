//! Audit records and their store.
//!
//! The audit store is independent of the event log: it holds a forensic
//! record of each live event occurrence and is queried by operators, never
//! by the write path.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::StoredEvent;
use crate::id::EntityId;

/// One audit row per live event publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Audit row identifier.
    pub audit_id: Uuid,
    /// The audited event. At most one record exists per event.
    pub event_id: Uuid,
    /// Entity the event mutated.
    pub entity_id: EntityId,
    /// The event type discriminator.
    pub event_type: String,
    /// Who issued the originating command.
    pub actor: String,
    /// When the event originally occurred.
    pub occurred_at: DateTime<Utc>,
    /// When the audit row was written.
    pub recorded_at: DateTime<Utc>,
    /// The full event, serialized as JSON.
    pub serialized_event: String,
}

impl AuditRecord {
    /// Builds the audit record for a stored event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if the event cannot be encoded.
    pub fn for_event(
        event: &StoredEvent,
        audit_id: Uuid,
        recorded_at: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            audit_id,
            event_id: event.event_id,
            entity_id: event.entity_id.clone(),
            event_type: event.event_type.clone(),
            actor: event.actor.clone(),
            occurred_at: event.occurred_at,
            recorded_at,
            serialized_event: serde_json::to_string(event)?,
        })
    }
}

/// Durable store for audit records.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Inserts a record. Returns `false` without writing if a record for the
    /// same `event_id` already exists.
    async fn insert(&self, record: AuditRecord) -> Result<bool, DomainError>;

    /// Returns the records for an entity, oldest first.
    async fn records_for_entity(&self, entity_id: &EntityId)
    -> Result<Vec<AuditRecord>, DomainError>;
}
