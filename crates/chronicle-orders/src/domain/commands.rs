//! Commands for the order lifecycle.

use chronicle_core::command::{Command, CommandMetadata};
use chronicle_core::id::EntityId;
use uuid::Uuid;

/// What a command asks the order to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderCommandKind {
    /// Place a new order.
    CreateOrder {
        /// Who the order is for.
        customer: String,
    },
    /// Add a line to a placed order.
    AddOrderLine {
        /// Stock keeping unit.
        sku: String,
        /// Units ordered.
        quantity: u32,
        /// Price per unit in cents.
        unit_price_cents: i64,
    },
    /// Hand a placed order to a carrier.
    ShipOrder {
        /// Carrier name.
        carrier: String,
        /// Carrier tracking number.
        tracking_number: String,
    },
    /// Cancel a placed order.
    CancelOrder {
        /// Why the order is cancelled.
        reason: String,
    },
}

/// A command targeting one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderCommand {
    /// Target, correlation, actor and optional expected sequence.
    pub metadata: CommandMetadata,
    /// The intent.
    pub kind: OrderCommandKind,
}

impl OrderCommand {
    /// Creates a command from metadata and intent.
    #[must_use]
    pub fn new(metadata: CommandMetadata, kind: OrderCommandKind) -> Self {
        Self { metadata, kind }
    }

    /// Builds a `CreateOrder` command.
    #[must_use]
    pub fn create_order(
        order_id: EntityId,
        correlation_id: Uuid,
        actor: impl Into<String>,
        customer: impl Into<String>,
    ) -> Self {
        Self::new(
            CommandMetadata::new(order_id, correlation_id, actor),
            OrderCommandKind::CreateOrder {
                customer: customer.into(),
            },
        )
    }

    /// Builds an `AddOrderLine` command.
    #[must_use]
    pub fn add_order_line(
        order_id: EntityId,
        correlation_id: Uuid,
        actor: impl Into<String>,
        sku: impl Into<String>,
        quantity: u32,
        unit_price_cents: i64,
    ) -> Self {
        Self::new(
            CommandMetadata::new(order_id, correlation_id, actor),
            OrderCommandKind::AddOrderLine {
                sku: sku.into(),
                quantity,
                unit_price_cents,
            },
        )
    }

    /// Builds a `ShipOrder` command.
    #[must_use]
    pub fn ship_order(
        order_id: EntityId,
        correlation_id: Uuid,
        actor: impl Into<String>,
        carrier: impl Into<String>,
        tracking_number: impl Into<String>,
    ) -> Self {
        Self::new(
            CommandMetadata::new(order_id, correlation_id, actor),
            OrderCommandKind::ShipOrder {
                carrier: carrier.into(),
                tracking_number: tracking_number.into(),
            },
        )
    }

    /// Builds a `CancelOrder` command.
    #[must_use]
    pub fn cancel_order(
        order_id: EntityId,
        correlation_id: Uuid,
        actor: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(
            CommandMetadata::new(order_id, correlation_id, actor),
            OrderCommandKind::CancelOrder {
                reason: reason.into(),
            },
        )
    }
}

impl Command for OrderCommand {
    fn command_type(&self) -> &'static str {
        match self.kind {
            OrderCommandKind::CreateOrder { .. } => "CreateOrder",
            OrderCommandKind::AddOrderLine { .. } => "AddOrderLine",
            OrderCommandKind::ShipOrder { .. } => "ShipOrder",
            OrderCommandKind::CancelOrder { .. } => "CancelOrder",
        }
    }

    fn metadata(&self) -> &CommandMetadata {
        &self.metadata
    }
}
