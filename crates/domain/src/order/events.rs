//! Order domain events.

use chrono::{DateTime, Duration, Utc};
use common::{ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{OrderDetails, OrderItem, OrderNumber, PaymentStatus};

/// Days between shipping and the default estimated delivery.
pub const DEFAULT_DELIVERY_DAYS: i64 = 7;

/// Events that can occur on an order aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    /// Order was placed with its lines.
    OrderPlaced(OrderPlacedData),

    /// Order was confirmed.
    OrderConfirmed(StatusChangedData),

    /// Order processing started.
    ProcessingStarted(StatusChangedData),

    /// Order was shipped.
    OrderShipped(OrderShippedData),

    /// Order was delivered.
    OrderDelivered(StatusChangedData),

    /// Order was cancelled.
    OrderCancelled(OrderCancelledData),

    /// Payment status changed.
    PaymentStatusChanged(PaymentStatusChangedData),

    /// Order notes were replaced.
    NotesAmended(NotesAmendedData),

    /// Stock could not be fully reserved after the order was persisted.
    StockReservationFailed(ReconciliationNote),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "OrderPlaced",
            OrderEvent::OrderConfirmed(_) => "OrderConfirmed",
            OrderEvent::ProcessingStarted(_) => "ProcessingStarted",
            OrderEvent::OrderShipped(_) => "OrderShipped",
            OrderEvent::OrderDelivered(_) => "OrderDelivered",
            OrderEvent::OrderCancelled(_) => "OrderCancelled",
            OrderEvent::PaymentStatusChanged(_) => "PaymentStatusChanged",
            OrderEvent::NotesAmended(_) => "NotesAmended",
            OrderEvent::StockReservationFailed(_) => "StockReservationFailed",
        }
    }
}

/// Data for OrderPlaced event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedData {
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub details: OrderDetails,
    pub items: Vec<OrderItem>,
    pub placed_at: DateTime<Utc>,
}

/// Data for status changes that carry nothing but a timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusChangedData {
    pub at: DateTime<Utc>,
}

/// Data for OrderShipped event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderShippedData {
    pub shipped_at: DateTime<Utc>,
    pub estimated_delivery: DateTime<Utc>,
}

/// Data for OrderCancelled event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCancelledData {
    pub reason: Option<String>,
    pub cancelled_at: DateTime<Utc>,
}

/// Data for PaymentStatusChanged event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusChangedData {
    pub previous: PaymentStatus,
    pub current: PaymentStatus,
    pub changed_at: DateTime<Utc>,
}

/// Data for NotesAmended event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotesAmendedData {
    pub notes: String,
    pub amended_at: DateTime<Utc>,
}

/// Marks an order whose stock reservation failed part-way.
///
/// The order stays persisted; the reservations that did succeed were
/// released (best effort) and the outcome is recorded here so operators can
/// reconcile stock and decide what to do with the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationNote {
    /// The line whose reservation failed.
    pub failed_product: ProductId,

    /// Why the reservation failed.
    pub reason: String,

    /// Lines reserved earlier and released again.
    pub released: Vec<ProductId>,

    /// Lines reserved earlier whose release also failed.
    pub unreleased: Vec<ProductId>,

    pub flagged_at: DateTime<Utc>,
}

// Convenience constructors for events
impl OrderEvent {
    pub fn order_placed(
        order_number: OrderNumber,
        user_id: UserId,
        details: OrderDetails,
        items: Vec<OrderItem>,
    ) -> Self {
        OrderEvent::OrderPlaced(OrderPlacedData {
            order_number,
            user_id,
            details,
            items,
            placed_at: Utc::now(),
        })
    }

    pub fn order_confirmed() -> Self {
        OrderEvent::OrderConfirmed(StatusChangedData { at: Utc::now() })
    }

    pub fn processing_started() -> Self {
        OrderEvent::ProcessingStarted(StatusChangedData { at: Utc::now() })
    }

    /// Creates an OrderShipped event, estimating delivery when none is known.
    pub fn order_shipped(estimated_delivery: Option<DateTime<Utc>>) -> Self {
        let shipped_at = Utc::now();
        OrderEvent::OrderShipped(OrderShippedData {
            shipped_at,
            estimated_delivery: estimated_delivery
                .unwrap_or(shipped_at + Duration::days(DEFAULT_DELIVERY_DAYS)),
        })
    }

    pub fn order_delivered() -> Self {
        OrderEvent::OrderDelivered(StatusChangedData { at: Utc::now() })
    }

    pub fn order_cancelled(reason: Option<String>) -> Self {
        OrderEvent::OrderCancelled(OrderCancelledData {
            reason,
            cancelled_at: Utc::now(),
        })
    }

    pub fn payment_status_changed(previous: PaymentStatus, current: PaymentStatus) -> Self {
        OrderEvent::PaymentStatusChanged(PaymentStatusChangedData {
            previous,
            current,
            changed_at: Utc::now(),
        })
    }

    pub fn notes_amended(notes: impl Into<String>) -> Self {
        OrderEvent::NotesAmended(NotesAmendedData {
            notes: notes.into(),
            amended_at: Utc::now(),
        })
    }

    pub fn stock_reservation_failed(
        failed_product: ProductId,
        reason: impl Into<String>,
        released: Vec<ProductId>,
        unreleased: Vec<ProductId>,
    ) -> Self {
        OrderEvent::StockReservationFailed(ReconciliationNote {
            failed_product,
            reason: reason.into(),
            released,
            unreleased,
            flagged_at: Utc::now(),
        })
    }

    /// Returns when the event happened.
    pub fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(data) => data.placed_at,
            OrderEvent::OrderConfirmed(data)
            | OrderEvent::ProcessingStarted(data)
            | OrderEvent::OrderDelivered(data) => data.at,
            OrderEvent::OrderShipped(data) => data.shipped_at,
            OrderEvent::OrderCancelled(data) => data.cancelled_at,
            OrderEvent::PaymentStatusChanged(data) => data.changed_at,
            OrderEvent::NotesAmended(data) => data.amended_at,
            OrderEvent::StockReservationFailed(note) => note.flagged_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipped_estimates_delivery_a_week_out() {
        let OrderEvent::OrderShipped(data) = OrderEvent::order_shipped(None) else {
            panic!("expected OrderShipped");
        };
        assert_eq!(
            data.estimated_delivery - data.shipped_at,
            Duration::days(DEFAULT_DELIVERY_DAYS)
        );
    }

    #[test]
    fn test_shipped_keeps_known_estimate() {
        let known = Utc::now() + Duration::days(2);
        let OrderEvent::OrderShipped(data) = OrderEvent::order_shipped(Some(known)) else {
            panic!("expected OrderShipped");
        };
        assert_eq!(data.estimated_delivery, known);
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = OrderEvent::order_cancelled(Some("customer request".to_string()));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "OrderCancelled");
        assert_eq!(json["data"]["reason"], "customer request");
        assert_eq!(event.event_type(), "OrderCancelled");
    }
}
