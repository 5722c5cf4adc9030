//! Query handlers for orders.
//!
//! Queries fold an order's history with the same projector the write path
//! uses and return a read-only view.

use chronicle_core::error::DomainError;
use chronicle_core::id::EntityId;
use chronicle_core::projector::fold;
use chronicle_core::repository::EventLog;
use serde::Serialize;

use crate::domain::aggregates::{Order, OrderLine, OrderStatus, Shipment};

/// Read-only view of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderView {
    /// The order identifier.
    pub order_id: EntityId,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Who the order is for.
    pub customer: Option<String>,
    /// Ordered lines.
    pub lines: Vec<OrderLine>,
    /// Sum of all lines in cents.
    pub total_cents: i64,
    /// Carrier details once shipped.
    pub shipment: Option<Shipment>,
    /// Reason once cancelled.
    pub cancellation_reason: Option<String>,
    /// Sequence of the last applied event.
    pub sequence: i64,
}

/// Retrieves an order by id.
///
/// # Errors
///
/// Returns `DomainError::EntityNotFound` if the order has no events, and the
/// projector's errors if its history cannot be folded.
pub async fn get_order(order_id: &EntityId, log: &dyn EventLog) -> Result<OrderView, DomainError> {
    let events = log.read_events(order_id, 1).await?;
    if events.is_empty() {
        return Err(DomainError::EntityNotFound(order_id.clone()));
    }
    let projection = fold::<Order>(order_id, &events)?;
    let total_cents = projection.state.total_cents();
    let order = projection.state;
    Ok(OrderView {
        order_id: order.order_id,
        status: order.status,
        customer: order.customer,
        lines: order.lines,
        total_cents,
        shipment: order.shipment,
        cancellation_reason: order.cancellation_reason,
        sequence: projection.sequence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_test_support::{FailingEventLog, StaticEventLog, stored_event};
    use serde_json::json;

    fn order_id() -> EntityId {
        EntityId::new("order-1").unwrap()
    }

    #[tokio::test]
    async fn test_get_order_returns_view_with_state() {
        // Arrange
        let log = StaticEventLog::new(vec![
            stored_event("order-1", 1, "order.created", json!({ "customer": "ada" })),
            stored_event(
                "order-1",
                2,
                "order.line_added",
                json!({ "sku": "SKU-1", "quantity": 3, "unit_price_cents": 200 }),
            ),
            stored_event(
                "order-1",
                3,
                "order.shipped",
                json!({ "carrier": "dhl", "tracking_number": "TRK-1" }),
            ),
        ]);

        // Act
        let view = get_order(&order_id(), &log).await.unwrap();

        // Assert
        assert_eq!(view.order_id, order_id());
        assert_eq!(view.status, OrderStatus::Shipped);
        assert_eq!(view.customer.as_deref(), Some("ada"));
        assert_eq!(view.total_cents, 600);
        assert_eq!(view.sequence, 3);
        assert_eq!(
            view.shipment.map(|s| s.tracking_number),
            Some("TRK-1".to_owned())
        );
    }

    #[tokio::test]
    async fn test_get_order_returns_not_found_for_empty_history() {
        let log = StaticEventLog::new(vec![]);

        let result = get_order(&order_id(), &log).await;

        match result {
            Err(DomainError::EntityNotFound(id)) => assert_eq!(id, order_id()),
            other => panic!("expected EntityNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_order_propagates_sequence_gap() {
        let log = StaticEventLog::new(vec![
            stored_event("order-1", 1, "order.created", json!({ "customer": "ada" })),
            stored_event(
                "order-1",
                3,
                "order.cancelled",
                json!({ "reason": "duplicate" }),
            ),
        ]);

        let result = get_order(&order_id(), &log).await;

        assert!(matches!(result, Err(DomainError::SequenceGap { .. })));
    }

    #[tokio::test]
    async fn test_get_order_propagates_infrastructure_error() {
        let result = get_order(&order_id(), &FailingEventLog).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
