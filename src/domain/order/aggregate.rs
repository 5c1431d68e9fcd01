use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use super::value_objects::{LineItem, Location, MonetaryAmount, OrderId, DEFAULT_CURRENCY};
use super::events::{OrderEvent, OrderPaid};
use super::commands::OrderCommand;
use super::errors::OrderError;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// The order owns its line items and knows its price. It deliberately has no
// status field: where an order stands in its lifecycle lives in the workflow
// engine and is read through the StatusProjector.
//
// Building an order does no I/O. Registering it with the engine is a separate
// step carried out by OrderCommandHandler.
//
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    // Identity
    id: OrderId,

    location: Location,
    ordered_date: DateTime<Utc>,
    line_items: Vec<LineItem>,

    // Raised but not yet published
    #[serde(skip)]
    pending_events: Vec<OrderEvent>,
}

impl Order {
    /// Build a new order. A missing location falls back to take-away.
    pub fn new(line_items: Vec<LineItem>, location: Option<Location>) -> Self {
        Self {
            id: OrderId::new(),
            location: location.unwrap_or_default(),
            ordered_date: Utc::now(),
            line_items,
            pending_events: Vec::new(),
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn business_key(&self) -> String {
        self.id.business_key()
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn ordered_date(&self) -> DateTime<Utc> {
        self.ordered_date
    }

    pub fn line_items(&self) -> &[LineItem] {
        &self.line_items
    }

    /// Sum of all line item prices; `0.00 EUR` for an empty order.
    pub fn price(&self) -> Result<MonetaryAmount, OrderError> {
        let mut items = self.line_items.iter();

        let Some(first) = items.next() else {
            return Ok(MonetaryAmount::zero(DEFAULT_CURRENCY));
        };

        items.try_fold(first.price.clone(), |total, item| total.checked_add(&item.price))
    }

    /// Domain events a lifecycle command raises. Pure.
    pub fn handle_command(&self, command: &OrderCommand) -> Vec<OrderEvent> {
        match command {
            OrderCommand::MarkPaid => vec![OrderEvent::Paid(OrderPaid {
                order_id: self.id.as_uuid(),
                paid_at: Utc::now(),
            })],
            OrderCommand::MarkInPreparation
            | OrderCommand::MarkPrepared
            | OrderCommand::MarkTaken => Vec::new(),
        }
    }

    /// Register the events of `command` for later publication.
    pub fn apply(&mut self, command: &OrderCommand) -> &mut Self {
        let events = self.handle_command(command);
        self.pending_events.extend(events);
        self
    }

    pub fn pending_events(&self) -> &[OrderEvent] {
        &self.pending_events
    }

    /// Drop the oldest pending event once it has been handed off.
    pub fn mark_oldest_published(&mut self) -> Option<OrderEvent> {
        if self.pending_events.is_empty() {
            return None;
        }
        Some(self.pending_events.remove(0))
    }
}

impl Default for Order {
    fn default() -> Self {
        Self::new(Vec::new(), None)
    }
}
