//! The order aggregate.

use chronicle_core::aggregate::Aggregate;
use chronicle_core::error::DomainError;
use chronicle_core::id::EntityId;
use serde::{Deserialize, Serialize};

use super::commands::{OrderCommand, OrderCommandKind};
use super::events::{OrderCancelled, OrderCreated, OrderEvent, OrderLineAdded, OrderShipped};

/// Where an order is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// No `order.created` event yet.
    NotPlaced,
    /// Created and open for lines.
    Placed,
    /// Handed to a carrier.
    Shipped,
    /// Cancelled before shipping.
    Cancelled,
}

/// One ordered item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    /// Stock keeping unit.
    pub sku: String,
    /// Units ordered.
    pub quantity: u32,
    /// Price per unit in cents.
    pub unit_price_cents: i64,
}

/// Carrier details of a shipped order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    /// Carrier name.
    pub carrier: String,
    /// Carrier tracking number.
    pub tracking_number: String,
}

/// The aggregate root for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Aggregate identifier.
    pub order_id: EntityId,
    /// Lifecycle status.
    pub status: OrderStatus,
    /// Who the order is for.
    pub customer: Option<String>,
    /// Lines in the order they were added.
    pub lines: Vec<OrderLine>,
    /// Set once shipped.
    pub shipment: Option<Shipment>,
    /// Set once cancelled.
    pub cancellation_reason: Option<String>,
}

impl Order {
    /// Sum of all lines in cents.
    #[must_use]
    pub fn total_cents(&self) -> i64 {
        self.lines
            .iter()
            .map(|line| i64::from(line.quantity) * line.unit_price_cents)
            .sum()
    }

    fn require_placed(&self, action: &str) -> Result<(), DomainError> {
        match self.status {
            OrderStatus::Placed => Ok(()),
            OrderStatus::NotPlaced => Err(DomainError::EntityNotFound(self.order_id.clone())),
            OrderStatus::Shipped | OrderStatus::Cancelled => {
                Err(DomainError::DomainRuleViolation(format!(
                    "cannot {action} order {}: it is {:?}",
                    self.order_id, self.status
                )))
            }
        }
    }
}

fn require_text(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::DomainRuleViolation(format!(
            "{field} must not be empty"
        )));
    }
    Ok(())
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Command = OrderCommand;
    const ENTITY_TYPE: &'static str = "order";

    fn initial(entity_id: &EntityId) -> Self {
        Self {
            order_id: entity_id.clone(),
            status: OrderStatus::NotPlaced,
            customer: None,
            lines: Vec::new(),
            shipment: None,
            cancellation_reason: None,
        }
    }

    fn apply(mut self, event: &OrderEvent) -> Self {
        match event {
            OrderEvent::Created(e) => {
                self.status = OrderStatus::Placed;
                self.customer = Some(e.customer.clone());
            }
            OrderEvent::LineAdded(e) => self.lines.push(OrderLine {
                sku: e.sku.clone(),
                quantity: e.quantity,
                unit_price_cents: e.unit_price_cents,
            }),
            OrderEvent::Shipped(e) => {
                self.status = OrderStatus::Shipped;
                self.shipment = Some(Shipment {
                    carrier: e.carrier.clone(),
                    tracking_number: e.tracking_number.clone(),
                });
            }
            OrderEvent::Cancelled(e) => {
                self.status = OrderStatus::Cancelled;
                self.cancellation_reason = Some(e.reason.clone());
            }
        }
        self
    }

    fn handle(&self, command: &OrderCommand) -> Result<Vec<OrderEvent>, DomainError> {
        match &command.kind {
            OrderCommandKind::CreateOrder { customer } => {
                if self.status != OrderStatus::NotPlaced {
                    return Err(DomainError::DomainRuleViolation(format!(
                        "order {} already exists",
                        self.order_id
                    )));
                }
                require_text("customer", customer)?;
                Ok(vec![OrderEvent::Created(OrderCreated {
                    customer: customer.clone(),
                })])
            }
            OrderCommandKind::AddOrderLine {
                sku,
                quantity,
                unit_price_cents,
            } => {
                self.require_placed("add a line to")?;
                require_text("sku", sku)?;
                if *quantity == 0 {
                    return Err(DomainError::DomainRuleViolation(
                        "quantity must be positive".into(),
                    ));
                }
                if *unit_price_cents < 0 {
                    return Err(DomainError::DomainRuleViolation(
                        "unit price must not be negative".into(),
                    ));
                }
                Ok(vec![OrderEvent::LineAdded(OrderLineAdded {
                    sku: sku.clone(),
                    quantity: *quantity,
                    unit_price_cents: *unit_price_cents,
                })])
            }
            OrderCommandKind::ShipOrder {
                carrier,
                tracking_number,
            } => {
                self.require_placed("ship")?;
                require_text("carrier", carrier)?;
                require_text("tracking number", tracking_number)?;
                Ok(vec![OrderEvent::Shipped(OrderShipped {
                    carrier: carrier.clone(),
                    tracking_number: tracking_number.clone(),
                })])
            }
            OrderCommandKind::CancelOrder { reason } => {
                self.require_placed("cancel")?;
                require_text("reason", reason)?;
                Ok(vec![OrderEvent::Cancelled(OrderCancelled {
                    reason: reason.clone(),
                })])
            }
        }
    }
}
