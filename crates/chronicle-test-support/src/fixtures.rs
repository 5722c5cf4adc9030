//! Stored event fixtures.

use chrono::{TimeZone, Utc};
use chronicle_core::event::StoredEvent;
use chronicle_core::id::EntityId;
use uuid::Uuid;

/// Builds a stored `order` event with a fresh id and a fixed timestamp.
///
/// # Panics
///
/// Panics if `entity_id` is blank.
#[must_use]
pub fn stored_event(
    entity_id: &str,
    sequence: i64,
    event_type: &str,
    payload: serde_json::Value,
) -> StoredEvent {
    StoredEvent {
        event_id: Uuid::new_v4(),
        entity_id: EntityId::new(entity_id).unwrap(),
        entity_type: "order".to_owned(),
        event_type: event_type.to_owned(),
        payload,
        sequence,
        correlation_id: Uuid::nil(),
        causation_id: Uuid::nil(),
        actor: "tester".to_owned(),
        occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
    }
}
