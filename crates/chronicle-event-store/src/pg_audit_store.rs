//! `PostgreSQL` implementation of the `AuditStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use chronicle_core::audit::{AuditRecord, AuditStore};
use chronicle_core::error::DomainError;
use chronicle_core::id::EntityId;

/// PostgreSQL-backed audit store.
#[derive(Debug, Clone)]
pub struct PgAuditStore {
    pool: PgPool,
}

impl PgAuditStore {
    /// Creates a new `PgAuditStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditRow {
    audit_id: Uuid,
    event_id: Uuid,
    entity_id: String,
    event_type: String,
    actor: String,
    occurred_at: DateTime<Utc>,
    recorded_at: DateTime<Utc>,
    serialized_event: String,
}

impl TryFrom<AuditRow> for AuditRecord {
    type Error = DomainError;

    fn try_from(row: AuditRow) -> Result<Self, Self::Error> {
        Ok(Self {
            audit_id: row.audit_id,
            event_id: row.event_id,
            entity_id: EntityId::new(row.entity_id)?,
            event_type: row.event_type,
            actor: row.actor,
            occurred_at: row.occurred_at,
            recorded_at: row.recorded_at,
            serialized_event: row.serialized_event,
        })
    }
}

fn database_error(e: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("database error: {e}"))
}

#[async_trait]
impl AuditStore for PgAuditStore {
    async fn insert(&self, record: AuditRecord) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "INSERT INTO audit_records \
             (audit_id, event_id, entity_id, event_type, actor, occurred_at, recorded_at, serialized_event) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(record.audit_id)
        .bind(record.event_id)
        .bind(record.entity_id.as_str())
        .bind(&record.event_type)
        .bind(&record.actor)
        .bind(record.occurred_at)
        .bind(record.recorded_at)
        .bind(&record.serialized_event)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn records_for_entity(
        &self,
        entity_id: &EntityId,
    ) -> Result<Vec<AuditRecord>, DomainError> {
        let rows: Vec<AuditRow> = sqlx::query_as(
            "SELECT audit_id, event_id, entity_id, event_type, actor, occurred_at, recorded_at, \
             serialized_event FROM audit_records WHERE entity_id = $1 \
             ORDER BY occurred_at, recorded_at",
        )
        .bind(entity_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        rows.into_iter().map(AuditRecord::try_from).collect()
    }
}
