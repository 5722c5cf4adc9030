//! `PostgreSQL` implementation of the `EventLog` trait.
//!
//! Appends for one entity are serialized with a transaction-scoped advisory
//! lock, so the latest-sequence check and the insert see the same stream.
//! The `UNIQUE (entity_id, sequence)` constraint backs this up: a writer
//! that slips past the check still cannot commit a duplicate sequence.
//!
//! Positions come from a sequence and are drawn before commit, so two
//! concurrent appends can become visible out of position order. `read_all`
//! hides rows whose transaction is not yet behind the snapshot horizon.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use chronicle_core::error::DomainError;
use chronicle_core::event::{RecordedEvent, StoredEvent};
use chronicle_core::id::EntityId;
use chronicle_core::repository::{EventLog, check_append_batch};

const EVENT_COLUMNS: &str = "e.position, e.event_id, e.entity_id, e.entity_type, e.event_type, \
     e.payload, e.sequence, e.correlation_id, e.causation_id, e.actor, e.occurred_at";

/// PostgreSQL-backed event log.
#[derive(Debug, Clone)]
pub struct PgEventLog {
    pool: PgPool,
}

impl PgEventLog {
    /// Creates a new `PgEventLog`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    position: i64,
    event_id: Uuid,
    entity_id: String,
    entity_type: String,
    event_type: String,
    payload: serde_json::Value,
    sequence: i64,
    correlation_id: Uuid,
    causation_id: Uuid,
    actor: String,
    occurred_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for RecordedEvent {
    type Error = DomainError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        Ok(Self {
            position: row.position,
            event: StoredEvent {
                event_id: row.event_id,
                entity_id: EntityId::new(row.entity_id)?,
                entity_type: row.entity_type,
                event_type: row.event_type,
                payload: row.payload,
                sequence: row.sequence,
                correlation_id: row.correlation_id,
                causation_id: row.causation_id,
                actor: row.actor,
                occurred_at: row.occurred_at,
            },
        })
    }
}

fn database_error(e: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("database error: {e}"))
}

fn to_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn into_recorded(rows: Vec<EventRow>) -> Result<Vec<RecordedEvent>, DomainError> {
    rows.into_iter().map(RecordedEvent::try_from).collect()
}

#[async_trait]
impl EventLog for PgEventLog {
    #[instrument(skip(self), fields(entity_id = %entity_id))]
    async fn read_events(
        &self,
        entity_id: &EntityId,
        from_sequence: i64,
    ) -> Result<Vec<StoredEvent>, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM event_log e \
             WHERE e.entity_id = $1 AND e.sequence >= $2 \
             ORDER BY e.sequence"
        ))
        .bind(entity_id.as_str())
        .bind(from_sequence)
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        Ok(into_recorded(rows)?.into_iter().map(|r| r.event).collect())
    }

    #[instrument(skip(self, events), fields(entity_id = %entity_id, count = events.len()))]
    async fn append_events(
        &self,
        entity_id: &EntityId,
        expected_sequence: i64,
        events: &[StoredEvent],
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        check_append_batch(entity_id, expected_sequence, events)?;
        if events.is_empty() {
            return Ok(vec![]);
        }

        let mut tx = self.pool.begin().await.map_err(database_error)?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(entity_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(database_error)?;

        let actual: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(sequence), 0) FROM event_log WHERE entity_id = $1",
        )
        .bind(entity_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(database_error)?;

        if actual != expected_sequence {
            warn!(expected_sequence, actual, "optimistic concurrency check failed");
            return Err(DomainError::ConcurrencyConflict {
                entity_id: entity_id.clone(),
                expected: expected_sequence,
                actual,
            });
        }

        let mut committed = Vec::with_capacity(events.len());
        for event in events {
            let position: i64 = sqlx::query_scalar(
                "INSERT INTO event_log \
                 (event_id, entity_id, entity_type, event_type, payload, sequence, \
                  correlation_id, causation_id, actor, occurred_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                 RETURNING position",
            )
            .bind(event.event_id)
            .bind(event.entity_id.as_str())
            .bind(&event.entity_type)
            .bind(&event.event_type)
            .bind(&event.payload)
            .bind(event.sequence)
            .bind(event.correlation_id)
            .bind(event.causation_id)
            .bind(&event.actor)
            .bind(event.occurred_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    DomainError::ConcurrencyConflict {
                        entity_id: entity_id.clone(),
                        expected: expected_sequence,
                        actual: event.sequence,
                    }
                }
                other => database_error(other),
            })?;

            sqlx::query("INSERT INTO event_outbox (event_id, position, entity_id) VALUES ($1, $2, $3)")
                .bind(event.event_id)
                .bind(position)
                .bind(entity_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(database_error)?;

            committed.push(RecordedEvent {
                position,
                event: event.clone(),
            });
        }

        tx.commit().await.map_err(database_error)?;
        debug!(
            first_position = committed.first().map(|r| r.position),
            "events appended"
        );
        Ok(committed)
    }

    /// Rows written by a transaction that is older than every transaction
    /// still in flight are returned. A concurrent append that drew a lower
    /// position but commits later is therefore never paged past.
    async fn read_all(
        &self,
        after_position: i64,
        limit: usize,
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM event_log e \
             WHERE e.position > $1 \
               AND e.transaction_id < pg_snapshot_xmin(pg_current_snapshot()) \
             ORDER BY e.position LIMIT $2"
        ))
        .bind(after_position)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        into_recorded(rows)
    }

    async fn pending_publications(
        &self,
        after_position: i64,
        limit: usize,
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM event_outbox o \
             JOIN event_log e ON e.event_id = o.event_id \
             WHERE o.published_at IS NULL AND o.position > $1 \
             ORDER BY o.position LIMIT $2"
        ))
        .bind(after_position)
        .bind(to_limit(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        into_recorded(rows)
    }

    async fn pending_publications_for(
        &self,
        entity_id: &EntityId,
    ) -> Result<Vec<RecordedEvent>, DomainError> {
        let rows: Vec<EventRow> = sqlx::query_as(&format!(
            "SELECT {EVENT_COLUMNS} FROM event_outbox o \
             JOIN event_log e ON e.event_id = o.event_id \
             WHERE o.published_at IS NULL AND o.entity_id = $1 ORDER BY o.position"
        ))
        .bind(entity_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        into_recorded(rows)
    }

    async fn mark_published(&self, event_ids: &[Uuid]) -> Result<(), DomainError> {
        if event_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            "UPDATE event_outbox SET published_at = NOW() \
             WHERE event_id = ANY($1) AND published_at IS NULL",
        )
        .bind(event_ids)
        .execute(&self.pool)
        .await
        .map_err(database_error)?;
        Ok(())
    }
}
