//! Event abstractions.
//!
//! A `StoredEvent` is the immutable record held by the event log. It has no
//! notion of replay: whether a dispatch is live or replayed is decided by
//! the publisher at dispatch time and never written back to the record.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::id::EntityId;

/// Durable representation of a domain event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Unique event identifier, minted at creation.
    pub event_id: Uuid,
    /// Entity this event mutates.
    pub entity_id: EntityId,
    /// Aggregate type of the entity (e.g. `order`).
    pub entity_type: String,
    /// Discriminator selecting the payload shape and projector branch.
    pub event_type: String,
    /// Event-specific data.
    pub payload: serde_json::Value,
    /// Position within the entity stream, starting at 1.
    pub sequence: i64,
    /// Correlation ID of the command that produced this event.
    pub correlation_id: Uuid,
    /// The command or event that caused this event.
    pub causation_id: Uuid,
    /// Who issued the originating command.
    pub actor: String,
    /// Timestamp of the original occurrence.
    pub occurred_at: DateTime<Utc>,
}

/// A stored event together with its global log position.
///
/// Positions are assigned by the event log on append and order events
/// across entities; `sequence` only orders events within one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Global, strictly increasing log position.
    pub position: i64,
    /// The stored event.
    pub event: StoredEvent,
}

/// Typed event payloads for one aggregate.
///
/// Implementations are closed enums. `from_stored` is the single place a
/// string discriminator is turned back into a variant and must return
/// `DomainError::UnknownEventType` for anything it does not recognize.
pub trait EventPayload: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Returns the event type discriminator for this variant.
    fn event_type(&self) -> &'static str;

    /// Serializes the variant's data.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Serialization` if encoding fails.
    fn to_payload(&self) -> Result<serde_json::Value, DomainError>;

    /// Decodes a stored event into its typed variant.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownEventType` for an unrecognized
    /// discriminator and `DomainError::Serialization` for a malformed payload.
    fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError>;
}

/// Encodes a payload struct as JSON.
///
/// # Errors
///
/// Returns `DomainError::Serialization` if encoding fails.
pub fn encode_payload<T: Serialize>(payload: &T) -> Result<serde_json::Value, DomainError> {
    Ok(serde_json::to_value(payload)?)
}

/// Decodes the payload of a stored event into a payload struct.
///
/// # Errors
///
/// Returns `DomainError::Serialization` naming the event if decoding fails.
pub fn decode_payload<T: DeserializeOwned>(stored: &StoredEvent) -> Result<T, DomainError> {
    T::deserialize(&stored.payload).map_err(|e| {
        DomainError::Serialization(format!(
            "{} event {} (sequence {}): {e}",
            stored.event_type, stored.event_id, stored.sequence
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug, Deserialize)]
    struct Shipped {
        carrier: String,
    }

    fn stored(payload: serde_json::Value) -> StoredEvent {
        StoredEvent {
            event_id: Uuid::nil(),
            entity_id: EntityId::new("order-1").unwrap(),
            entity_type: "order".to_owned(),
            event_type: "order.shipped".to_owned(),
            payload,
            sequence: 2,
            correlation_id: Uuid::nil(),
            causation_id: Uuid::nil(),
            actor: "clerk".to_owned(),
            occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_decode_payload_reads_matching_struct() {
        let event = stored(serde_json::json!({ "carrier": "dhl" }));

        let shipped: Shipped = decode_payload(&event).unwrap();

        assert_eq!(shipped.carrier, "dhl");
    }

    #[test]
    fn test_decode_payload_reports_event_on_mismatch() {
        let event = stored(serde_json::json!({ "courier": "dhl" }));

        let result: Result<Shipped, _> = decode_payload(&event);

        match result {
            Err(DomainError::Serialization(msg)) => {
                assert!(msg.starts_with("order.shipped event"));
                assert!(msg.contains("sequence 2"));
            }
            other => panic!("expected Serialization, got {other:?}"),
        }
    }

    #[test]
    fn test_stored_event_has_no_replay_marker() {
        let json = serde_json::to_value(stored(serde_json::json!({}))).unwrap();

        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert!(!keys.iter().any(|k| k.contains("replay")));
    }
}
