use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use crate::events::DomainEvent;

// ============================================================================
// Order Events - Domain Events raised by the Order aggregate
// ============================================================================

/// Order Event - Union type for all order events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    Paid(OrderPaid),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Paid(_) => "OrderPaid",
        }
    }
}

/// Order Paid - payment for the order completed
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct OrderPaid {
    pub order_id: Uuid,
    pub paid_at: DateTime<Utc>,
}
