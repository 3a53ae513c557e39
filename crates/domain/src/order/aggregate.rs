//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

use super::{
    Money, OrderDetails, OrderError, OrderEvent, OrderItem, OrderNumber, OrderStatus,
    PaymentStatus, ReconciliationNote, Transition,
    events::{OrderPlacedData, OrderShippedData},
};

/// Order aggregate root.
///
/// Every mutation goes through a command method that checks the lifecycle
/// state machine and returns events, which are then applied. The total
/// amount is always derived from the lines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Order {
    /// Assigned by the order store on first save.
    id: Option<OrderId>,

    /// Persistence version for optimistic concurrency.
    #[serde(default)]
    version: Version,

    order_number: Option<OrderNumber>,
    user_id: Option<UserId>,
    status: OrderStatus,
    payment_status: PaymentStatus,

    details: OrderDetails,

    /// Lines in the order they were requested.
    items: Vec<OrderItem>,

    estimated_delivery: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,

    /// Present when stock reservation failed after the order was persisted.
    reconciliation: Option<ReconciliationNote>,

    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Aggregate for Order {
    type Event = OrderEvent;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn apply(&mut self, event: Self::Event) {
        let occurred_at = event.occurred_at();

        match event {
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::OrderConfirmed(_) => {
                self.status = OrderStatus::Confirmed;
            }
            OrderEvent::ProcessingStarted(_) => {
                self.status = OrderStatus::Processing;
            }
            OrderEvent::OrderShipped(data) => self.apply_order_shipped(data),
            OrderEvent::OrderDelivered(data) => {
                self.status = OrderStatus::Delivered;
                self.delivered_at.get_or_insert(data.at);
            }
            OrderEvent::OrderCancelled(data) => {
                self.status = OrderStatus::Cancelled;
                self.cancelled_at.get_or_insert(data.cancelled_at);
                if self.cancellation_reason.is_none() {
                    self.cancellation_reason = data.reason;
                }
            }
            OrderEvent::PaymentStatusChanged(data) => {
                self.payment_status = data.current;
            }
            OrderEvent::NotesAmended(data) => {
                self.details.notes = Some(data.notes);
            }
            OrderEvent::StockReservationFailed(note) => {
                self.reconciliation = Some(note);
            }
        }

        self.updated_at = Some(occurred_at);
    }
}

// Query methods
impl Order {
    /// Returns the store-assigned identifier, if the order was saved.
    pub fn id(&self) -> Option<OrderId> {
        self.id
    }

    /// Returns the persistence version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns the order number, if the order was placed.
    pub fn order_number(&self) -> Option<&OrderNumber> {
        self.order_number.as_ref()
    }

    /// Returns the buyer.
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Returns the lifecycle status.
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Returns the payment status.
    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn shipping_address(&self) -> &str {
        &self.details.shipping_address
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.details.payment_method.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.details.notes.as_deref()
    }

    /// Returns the lines in request order.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns the number of lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Returns the total quantity of all lines.
    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Returns the sum of all line totals.
    pub fn total_amount(&self) -> Money {
        self.items.iter().map(OrderItem::total_price).sum()
    }

    pub fn estimated_delivery(&self) -> Option<DateTime<Utc>> {
        self.estimated_delivery
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    /// Returns the reconciliation note of a partially reserved order.
    pub fn reconciliation(&self) -> Option<&ReconciliationNote> {
        self.reconciliation.as_ref()
    }

    /// Returns true if stock reservation failed after the order was persisted.
    pub fn needs_reconciliation(&self) -> bool {
        self.reconciliation.is_some()
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    /// Returns true if the order can still be cancelled.
    pub fn can_be_cancelled(&self) -> bool {
        self.status.can_be_cancelled()
    }

    /// Returns true if the order reached a terminal status.
    pub fn is_finalized(&self) -> bool {
        self.status.is_finalized()
    }

    /// Returns true if the order was placed.
    pub fn is_placed(&self) -> bool {
        self.order_number.is_some()
    }
}

// Persistence hooks
impl Order {
    /// Records the identity and version assigned by an order store.
    ///
    /// Only storage implementations call this; the id is never changed once set.
    pub fn mark_persisted(&mut self, id: OrderId, version: Version) {
        self.id.get_or_insert(id);
        self.version = version;
    }
}

// Command methods (return events)
impl Order {
    /// Places a new order with the given lines.
    pub fn place(
        &self,
        order_number: OrderNumber,
        user_id: UserId,
        details: OrderDetails,
        items: Vec<OrderItem>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.is_placed() {
            return Err(OrderError::AlreadyPlaced);
        }

        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        let mut total = Money::zero();
        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id(),
                    quantity: item.quantity,
                });
            }

            if !item.unit_price.is_positive() {
                return Err(OrderError::InvalidPrice {
                    product_id: item.product_id(),
                    price: item.unit_price,
                });
            }

            total = item
                .unit_price
                .checked_multiply(item.quantity)
                .and_then(|line| total.checked_add(line))
                .ok_or(OrderError::AmountOverflow {
                    product_id: item.product_id(),
                })?;
        }

        Ok(vec![OrderEvent::order_placed(
            order_number,
            user_id,
            details,
            items,
        )])
    }

    /// Confirms a pending order.
    pub fn confirm(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.guard(Transition::Confirm)?;
        Ok(vec![OrderEvent::order_confirmed()])
    }

    /// Starts processing a confirmed order.
    pub fn start_processing(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.guard(Transition::StartProcessing)?;
        Ok(vec![OrderEvent::processing_started()])
    }

    /// Ships an order that is being processed.
    pub fn ship(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.guard(Transition::Ship)?;
        Ok(vec![OrderEvent::order_shipped(self.estimated_delivery)])
    }

    /// Marks a shipped order as delivered.
    pub fn deliver(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.guard(Transition::Deliver)?;
        Ok(vec![OrderEvent::order_delivered()])
    }

    /// Cancels an order that has not shipped yet.
    pub fn cancel(&self, reason: Option<String>) -> Result<Vec<OrderEvent>, OrderError> {
        self.guard(Transition::Cancel)?;
        Ok(vec![OrderEvent::order_cancelled(reason)])
    }

    /// Applies the lifecycle operation that leads to `transition`.
    pub fn transition(
        &self,
        transition: Transition,
        reason: Option<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        match transition {
            Transition::Confirm => self.confirm(),
            Transition::StartProcessing => self.start_processing(),
            Transition::Ship => self.ship(),
            Transition::Deliver => self.deliver(),
            Transition::Cancel => self.cancel(reason),
        }
    }

    /// Updates the payment status.
    ///
    /// A payment reaching `Paid` while the order is pending also confirms it.
    pub fn update_payment_status(
        &self,
        payment_status: PaymentStatus,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status.is_finalized() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action: "update payment status",
            });
        }

        let mut events = vec![OrderEvent::payment_status_changed(
            self.payment_status,
            payment_status,
        )];

        if payment_status == PaymentStatus::Paid && self.status == OrderStatus::Pending {
            events.extend(self.confirm()?);
        }

        Ok(events)
    }

    /// Replaces the order notes.
    pub fn amend_notes(&self, notes: impl Into<String>) -> Result<Vec<OrderEvent>, OrderError> {
        if !self.is_placed() {
            return Err(OrderError::NoItems);
        }
        Ok(vec![OrderEvent::notes_amended(notes)])
    }

    /// Flags the order for reconciliation after a partial stock reservation.
    ///
    /// A concurrent status change may already have moved the order past
    /// pending, so any non-terminal status accepts the flag.
    pub fn flag_stock_reservation_failure(
        &self,
        failed_product: common::ProductId,
        reason: impl Into<String>,
        released: Vec<common::ProductId>,
        unreleased: Vec<common::ProductId>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.status.is_finalized() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action: "flag stock reservation failure",
            });
        }

        Ok(vec![OrderEvent::stock_reservation_failed(
            failed_product,
            reason,
            released,
            unreleased,
        )])
    }

    fn guard(&self, transition: Transition) -> Result<OrderStatus, OrderError> {
        self.status
            .transition(transition)
            .ok_or(OrderError::InvalidStateTransition {
                current_state: self.status,
                action: transition.as_str(),
            })
    }
}

// Apply event helpers
impl Order {
    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.order_number = Some(data.order_number);
        self.user_id = Some(data.user_id);
        self.details = data.details;
        self.items = data.items;
        self.status = OrderStatus::Pending;
        self.payment_status = PaymentStatus::Pending;
        self.created_at = Some(data.placed_at);
    }

    fn apply_order_shipped(&mut self, data: OrderShippedData) {
        self.status = OrderStatus::Shipped;
        self.shipped_at.get_or_insert(data.shipped_at);
        self.estimated_delivery.get_or_insert(data.estimated_delivery);
    }
}
