//! Status coordinator for persisted orders.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use domain::{
    Aggregate, Money, Order, OrderError, OrderEvent, OrderNumber, OrderStatus, PaymentStatus,
    Transition,
};
use order_store::{OrderStatistics, OrderStore, StoreError};

use crate::clients::StockReservationClient;
use crate::config::SagaConfig;
use crate::error::{OrderRef, Result, TransitionError};
use crate::request::{MAX_NOTES_LEN, MAX_REASON_LEN, check_optional_len};
use crate::services::Catalog;

/// Applies lifecycle operations to persisted orders.
///
/// Every operation loads the order, applies exactly one change and saves it
/// with the loaded version as the expectation. A concurrent writer makes the
/// save fail; the order is then re-read and the change reported as an invalid
/// transition from the status the other writer left behind.
///
/// Cancelling releases the stock of every line, unless the order was flagged
/// for reconciliation during creation.
pub struct OrderStatusCoordinator<S, C>
where
    S: OrderStore,
    C: Catalog,
{
    store: S,
    stock: StockReservationClient<C>,
}

impl<S, C> OrderStatusCoordinator<S, C>
where
    S: OrderStore,
    C: Catalog,
{
    /// Creates a new coordinator.
    pub fn new(store: S, catalog: C, config: &SagaConfig) -> Self {
        Self {
            store,
            stock: StockReservationClient::new(catalog, config),
        }
    }

    pub async fn confirm(&self, id: OrderId) -> Result<Order> {
        self.transition(id.into(), Transition::Confirm, None).await
    }

    pub async fn confirm_by_number(&self, number: &OrderNumber) -> Result<Order> {
        self.transition(number.clone().into(), Transition::Confirm, None)
            .await
    }

    pub async fn start_processing(&self, id: OrderId) -> Result<Order> {
        self.transition(id.into(), Transition::StartProcessing, None)
            .await
    }

    pub async fn start_processing_by_number(&self, number: &OrderNumber) -> Result<Order> {
        self.transition(number.clone().into(), Transition::StartProcessing, None)
            .await
    }

    /// Ships the order and sets its estimated delivery date.
    pub async fn ship(&self, id: OrderId) -> Result<Order> {
        self.transition(id.into(), Transition::Ship, None).await
    }

    pub async fn ship_by_number(&self, number: &OrderNumber) -> Result<Order> {
        self.transition(number.clone().into(), Transition::Ship, None)
            .await
    }

    pub async fn deliver(&self, id: OrderId) -> Result<Order> {
        self.transition(id.into(), Transition::Deliver, None).await
    }

    pub async fn deliver_by_number(&self, number: &OrderNumber) -> Result<Order> {
        self.transition(number.clone().into(), Transition::Deliver, None)
            .await
    }

    /// Cancels the order and releases its stock.
    pub async fn cancel(&self, id: OrderId, reason: Option<String>) -> Result<Order> {
        self.transition(id.into(), Transition::Cancel, reason).await
    }

    pub async fn cancel_by_number(
        &self,
        number: &OrderNumber,
        reason: Option<String>,
    ) -> Result<Order> {
        self.transition(number.clone().into(), Transition::Cancel, reason)
            .await
    }

    /// Records a new payment status. `Paid` confirms a pending order.
    pub async fn update_payment_status(
        &self,
        id: OrderId,
        payment_status: PaymentStatus,
    ) -> Result<Order> {
        self.change(id.into(), "update payment status", |order| {
            order.update_payment_status(payment_status)
        })
        .await
    }

    pub async fn update_payment_status_by_number(
        &self,
        number: &OrderNumber,
        payment_status: PaymentStatus,
    ) -> Result<Order> {
        self.change(number.clone().into(), "update payment status", |order| {
            order.update_payment_status(payment_status)
        })
        .await
    }

    /// Moves the order to `target` through the matching lifecycle operation.
    ///
    /// `notes`, when given, replace the order notes in the same save.
    /// `Pending` and `Returned` are never reachable this way.
    pub async fn update_status(
        &self,
        id: OrderId,
        target: OrderStatus,
        reason: Option<String>,
        notes: Option<String>,
    ) -> Result<Order> {
        self.update_status_ref(id.into(), target, reason, notes)
            .await
    }

    pub async fn update_status_by_number(
        &self,
        number: &OrderNumber,
        target: OrderStatus,
        reason: Option<String>,
        notes: Option<String>,
    ) -> Result<Order> {
        self.update_status_ref(number.clone().into(), target, reason, notes)
            .await
    }

    /// Returns the order with the given id.
    pub async fn get_order(&self, id: OrderId) -> Result<Order> {
        self.load(&id.into()).await
    }

    pub async fn get_order_by_number(&self, number: &OrderNumber) -> Result<Order> {
        self.load(&number.clone().into()).await
    }

    /// Returns the orders of a user, newest first.
    pub async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self.store.find_by_user(user_id).await?)
    }

    /// Returns the orders in a status, oldest first.
    pub async fn orders_with_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        Ok(self.store.find_by_status(status).await?)
    }

    pub async fn orders_needing_reconciliation(&self) -> Result<Vec<Order>> {
        Ok(self.store.find_needing_reconciliation().await?)
    }

    /// Returns the orders created within `[from, to]`, newest first.
    pub async fn orders_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        if from > to {
            return Err(TransitionError::Validation(format!(
                "range start {from} is after its end {to}"
            )));
        }
        Ok(self.store.find_by_date_range(from, to).await?)
    }

    /// Returns shipped orders whose estimated delivery lies before `as_of`.
    pub async fn overdue_deliveries(&self, as_of: DateTime<Utc>) -> Result<Vec<Order>> {
        Ok(self.store.find_overdue_deliveries(as_of).await?)
    }

    /// Returns the shipped and delivered sales of orders created within `[from, to]`.
    pub async fn sales_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Money> {
        if from > to {
            return Err(TransitionError::Validation(format!(
                "range start {from} is after its end {to}"
            )));
        }
        Ok(self.store.sales_between(from, to).await?)
    }

    /// Returns aggregate figures, with daily figures for the current UTC day.
    pub async fn statistics(&self) -> Result<OrderStatistics> {
        self.statistics_as_of(Utc::now()).await
    }

    pub async fn statistics_as_of(&self, as_of: DateTime<Utc>) -> Result<OrderStatistics> {
        Ok(self.store.statistics(as_of).await?)
    }

    async fn transition(
        &self,
        order_ref: OrderRef,
        transition: Transition,
        reason: Option<String>,
    ) -> Result<Order> {
        validate_reason(reason.as_deref())?;
        self.change(order_ref, transition.as_str(), move |order| {
            order.transition(transition, reason)
        })
        .await
    }

    async fn update_status_ref(
        &self,
        order_ref: OrderRef,
        target: OrderStatus,
        reason: Option<String>,
        notes: Option<String>,
    ) -> Result<Order> {
        validate_reason(reason.as_deref())?;
        check_optional_len("notes", notes.as_deref(), MAX_NOTES_LEN)
            .map_err(TransitionError::Validation)?;

        let transition = Transition::to_status(target);
        let action = match (transition, target) {
            (Some(transition), _) => transition.as_str(),
            (None, OrderStatus::Pending) => "reopen",
            (None, _) => "return",
        };

        self.change(order_ref, action, move |order| {
            let Some(transition) = transition else {
                return Err(OrderError::InvalidStateTransition {
                    current_state: order.status(),
                    action,
                });
            };

            let mut events = order.transition(transition, reason)?;
            if let Some(notes) = notes {
                events.extend(order.amend_notes(notes)?);
            }
            Ok(events)
        })
        .await
    }

    /// Loads the order, applies the events `decide` returns and saves it.
    #[tracing::instrument(skip(self, decide), fields(order = %order_ref))]
    async fn change<F>(
        &self,
        order_ref: OrderRef,
        action: &'static str,
        decide: F,
    ) -> Result<Order>
    where
        F: FnOnce(&Order) -> std::result::Result<Vec<OrderEvent>, OrderError>,
    {
        let mut order = self.load(&order_ref).await?;
        let previous = order.status();

        let events = decide(&order)?;
        order.apply_events(events);

        match self.store.save(&mut order).await {
            Ok(_) => {}
            Err(StoreError::ConcurrencyConflict {
                order_id,
                expected,
                actual,
            }) => {
                let current = self.load(&order_ref).await?;
                tracing::warn!(
                    %order_id,
                    %expected,
                    %actual,
                    current_status = %current.status(),
                    action,
                    "order changed concurrently"
                );
                return Err(OrderError::InvalidStateTransition {
                    current_state: current.status(),
                    action,
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        }

        metrics::counter!("order_transitions_total", "action" => action).increment(1);
        tracing::info!(
            order_id = ?order.id(),
            from = %previous,
            to = %order.status(),
            action,
            "order updated"
        );

        if previous != OrderStatus::Cancelled && order.status() == OrderStatus::Cancelled {
            self.release_stock(&order).await;
        }

        Ok(order)
    }

    /// Puts every line's quantity back into stock, best effort.
    async fn release_stock(&self, order: &Order) {
        if order.needs_reconciliation() {
            tracing::info!(
                order_id = ?order.id(),
                "order flagged for reconciliation, stock not released"
            );
            return;
        }

        let mut failed = Vec::new();
        for item in order.items() {
            if !self
                .stock
                .release(item.product_id(), item.quantity)
                .await
                .is_released()
            {
                failed.push(item.product_id());
            }
        }

        if !failed.is_empty() {
            tracing::warn!(
                order_id = ?order.id(),
                order_number = ?order.order_number().map(|n| n.as_str()),
                products = ?failed,
                "stock not released for some lines of cancelled order"
            );
        }
    }

    async fn load(&self, order_ref: &OrderRef) -> Result<Order> {
        let order = match order_ref {
            OrderRef::Id(id) => self.store.find_by_id(*id).await?,
            OrderRef::Number(number) => self.store.find_by_number(number).await?,
        };
        order.ok_or_else(|| TransitionError::NotFound(order_ref.clone()))
    }
}

fn validate_reason(reason: Option<&str>) -> Result<()> {
    check_optional_len("reason", reason, MAX_REASON_LEN).map_err(TransitionError::Validation)
}
