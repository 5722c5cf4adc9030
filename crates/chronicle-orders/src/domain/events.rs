//! Domain events for the order lifecycle.

use chronicle_core::error::DomainError;
use chronicle_core::event::{EventPayload, StoredEvent, decode_payload, encode_payload};
use serde::{Deserialize, Serialize};

/// Emitted when an order is placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    /// Who the order is for.
    pub customer: String,
}

/// Emitted when a line is added to a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineAdded {
    /// Stock keeping unit.
    pub sku: String,
    /// Units ordered; always positive.
    pub quantity: u32,
    /// Price per unit in cents.
    pub unit_price_cents: i64,
}

/// Emitted when an order leaves the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderShipped {
    /// Carrier name.
    pub carrier: String,
    /// Carrier tracking number.
    pub tracking_number: String,
}

/// Emitted when an order is cancelled before shipping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCancelled {
    /// Why the order was cancelled.
    pub reason: String,
}

/// Event payload variants for the order lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderEvent {
    /// The order was placed.
    Created(OrderCreated),
    /// A line was added.
    LineAdded(OrderLineAdded),
    /// The order shipped.
    Shipped(OrderShipped),
    /// The order was cancelled.
    Cancelled(OrderCancelled),
}

impl EventPayload for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => "order.created",
            Self::LineAdded(_) => "order.line_added",
            Self::Shipped(_) => "order.shipped",
            Self::Cancelled(_) => "order.cancelled",
        }
    }

    fn to_payload(&self) -> Result<serde_json::Value, DomainError> {
        match self {
            Self::Created(p) => encode_payload(p),
            Self::LineAdded(p) => encode_payload(p),
            Self::Shipped(p) => encode_payload(p),
            Self::Cancelled(p) => encode_payload(p),
        }
    }

    fn from_stored(stored: &StoredEvent) -> Result<Self, DomainError> {
        match stored.event_type.as_str() {
            "order.created" => decode_payload(stored).map(Self::Created),
            "order.line_added" => decode_payload(stored).map(Self::LineAdded),
            "order.shipped" => decode_payload(stored).map(Self::Shipped),
            "order.cancelled" => decode_payload(stored).map(Self::Cancelled),
            other => Err(DomainError::UnknownEventType {
                entity_id: stored.entity_id.clone(),
                event_type: other.to_owned(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_test_support::stored_event;
    use serde_json::json;

    #[test]
    fn test_line_added_payload_shape() {
        let event = OrderEvent::LineAdded(OrderLineAdded {
            sku: "SKU-1".to_owned(),
            quantity: 2,
            unit_price_cents: 450,
        });

        let payload = event.to_payload().unwrap();

        assert_eq!(event.event_type(), "order.line_added");
        assert_eq!(
            payload,
            json!({ "sku": "SKU-1", "quantity": 2, "unit_price_cents": 450 })
        );
    }

    #[test]
    fn test_from_stored_decodes_known_type() {
        let stored = stored_event(
            "order-1",
            2,
            "order.shipped",
            json!({ "carrier": "dhl", "tracking_number": "TRK-9" }),
        );

        let event = OrderEvent::from_stored(&stored).unwrap();

        assert_eq!(
            event,
            OrderEvent::Shipped(OrderShipped {
                carrier: "dhl".to_owned(),
                tracking_number: "TRK-9".to_owned(),
            })
        );
    }

    #[test]
    fn test_from_stored_rejects_unknown_type() {
        let stored = stored_event("order-1", 2, "order.refunded", json!({}));

        let result = OrderEvent::from_stored(&stored);

        match result {
            Err(DomainError::UnknownEventType { event_type, .. }) => {
                assert_eq!(event_type, "order.refunded");
            }
            other => panic!("expected UnknownEventType, got {other:?}"),
        }
    }

    #[test]
    fn test_from_stored_rejects_malformed_payload() {
        let stored = stored_event("order-1", 1, "order.created", json!({ "client": "ada" }));

        let result = OrderEvent::from_stored(&stored);

        assert!(matches!(result, Err(DomainError::Serialization(_))));
    }
}
