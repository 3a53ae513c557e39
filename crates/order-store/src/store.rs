use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use common::{OrderId, UserId, Version};
use domain::{Money, Order, OrderNumber, OrderStatus};
use serde::{Deserialize, Serialize};

use crate::{Result, StoreError};

/// Core trait for order store implementations.
///
/// A store keeps the latest state of every order. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Saves an order and its lines as one unit.
    ///
    /// An order without an id is inserted and receives one. An order with an
    /// id is updated only if the stored version still equals
    /// `order.version()`, otherwise the call fails with `ConcurrencyConflict`.
    /// A number already used by another order fails with
    /// `DuplicateOrderNumber`.
    ///
    /// On success the order carries its id and new version.
    async fn save(&self, order: &mut Order) -> Result<Version>;

    /// Retrieves an order by its id.
    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>>;

    /// Retrieves an order by its number.
    async fn find_by_number(&self, number: &OrderNumber) -> Result<Option<Order>>;

    /// Returns true if an order with this number exists.
    async fn exists_by_number(&self, number: &OrderNumber) -> Result<bool>;

    /// Retrieves the orders of a user, newest first.
    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Retrieves all orders in a status, oldest first.
    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>>;

    /// Retrieves orders flagged after a partial stock reservation, oldest first.
    async fn find_needing_reconciliation(&self) -> Result<Vec<Order>>;

    /// Retrieves orders created within `[from, to]`, newest first.
    async fn find_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>>;

    /// Retrieves shipped orders whose estimated delivery lies before `now`,
    /// earliest estimate first.
    async fn find_overdue_deliveries(&self, now: DateTime<Utc>) -> Result<Vec<Order>>;

    /// Sums the totals of shipped and delivered orders created within
    /// `[from, to]`.
    async fn sales_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Money>;

    /// Computes aggregate figures over all stored orders.
    ///
    /// The daily figures cover the UTC calendar day containing `as_of`.
    async fn statistics(&self, as_of: DateTime<Utc>) -> Result<OrderStatistics>;
}

/// Extension trait providing convenience methods for order stores.
#[async_trait]
pub trait OrderStoreExt: OrderStore {
    /// Retrieves an order by id, failing with `NotFound` if it does not exist.
    async fn get(&self, id: OrderId) -> Result<Order> {
        self.find_by_id(id).await?.ok_or(StoreError::NotFound(id))
    }
}

impl<T: OrderStore + ?Sized> OrderStoreExt for T {}

/// Statuses whose order totals count as sales.
pub const SALES_STATUSES: [OrderStatus; 2] = [OrderStatus::Shipped, OrderStatus::Delivered];

/// Aggregate figures over the stored orders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatistics {
    pub total_orders: u64,
    pub by_status: HashMap<OrderStatus, u64>,
    /// Mean total of the orders that were not cancelled.
    pub average_order_value: Money,
    /// Orders created on the reporting day.
    pub orders_today: u64,
    /// Shipped and delivered totals of orders created on the reporting day.
    pub sales_today: Money,
}

impl OrderStatistics {
    /// Builds statistics from per-status order counts and amount sums.
    pub fn from_status_totals(
        totals: impl IntoIterator<Item = (OrderStatus, u64, Money)>,
    ) -> Self {
        let mut by_status = HashMap::new();
        let mut total_orders = 0u64;
        let mut counted_orders = 0u64;
        let mut counted_amount = Money::zero();

        for (status, count, amount) in totals {
            *by_status.entry(status).or_insert(0) += count;
            total_orders += count;
            if status != OrderStatus::Cancelled {
                counted_orders += count;
                counted_amount += amount;
            }
        }

        let average_order_value = match i64::try_from(counted_orders) {
            Ok(count) if count > 0 => Money::from_cents(counted_amount.cents() / count),
            _ => Money::zero(),
        };

        Self {
            total_orders,
            by_status,
            average_order_value,
            orders_today: 0,
            sales_today: Money::zero(),
        }
    }

    /// Sets the figures of the reporting day.
    pub fn with_today(mut self, orders: u64, sales: Money) -> Self {
        self.orders_today = orders;
        self.sales_today = sales;
        self
    }

    /// Returns the number of orders in a status.
    pub fn count(&self, status: OrderStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Returns the half-open UTC day `[start, end)` containing `as_of`.
pub fn day_bounds(as_of: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = as_of.date_naive().and_time(NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

/// Checks that an order can be written to a store.
pub(crate) fn validate_for_save(order: &Order) -> Result<&OrderNumber> {
    order.order_number().ok_or(StoreError::NotPlaced)
}
