use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId, Version};
use domain::{Money, Order, OrderNumber, OrderStatus};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{OrderStatistics, OrderStore, SALES_STATUSES, day_bounds, validate_for_save},
};

#[derive(Default)]
struct Inner {
    orders: BTreeMap<OrderId, Order>,
    last_id: i64,
}

/// In-memory order store implementation for testing.
///
/// This implementation keeps all orders in memory and enforces the same
/// version and order-number rules as the PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.inner.read().await.orders.len()
    }

    async fn collect(&self, filter: impl Fn(&Order) -> bool) -> Vec<Order> {
        self.inner
            .read()
            .await
            .orders
            .values()
            .filter(|order| filter(order))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save(&self, order: &mut Order) -> Result<Version> {
        let number = validate_for_save(order)?.clone();
        let mut inner = self.inner.write().await;

        // Unique constraint simulation
        let taken = inner
            .orders
            .values()
            .any(|stored| stored.order_number() == Some(&number) && stored.id() != order.id());
        if taken {
            return Err(StoreError::DuplicateOrderNumber(number));
        }

        let expected = order.version();
        let id = match order.id() {
            Some(id) => {
                let actual = inner
                    .orders
                    .get(&id)
                    .map(Order::version)
                    .ok_or(StoreError::NotFound(id))?;
                if actual != expected {
                    return Err(StoreError::ConcurrencyConflict {
                        order_id: id,
                        expected,
                        actual,
                    });
                }
                id
            }
            None => {
                inner.last_id += 1;
                OrderId::new(inner.last_id)
            }
        };

        let new_version = expected.next();
        order.mark_persisted(id, new_version);
        inner.orders.insert(id, order.clone());

        Ok(new_version)
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn find_by_number(&self, number: &OrderNumber) -> Result<Option<Order>> {
        Ok(self
            .inner
            .read()
            .await
            .orders
            .values()
            .find(|order| order.order_number() == Some(number))
            .cloned())
    }

    async fn exists_by_number(&self, number: &OrderNumber) -> Result<bool> {
        Ok(self
            .inner
            .read()
            .await
            .orders
            .values()
            .any(|order| order.order_number() == Some(number)))
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let mut orders = self
            .collect(|order| order.user_id() == Some(user_id))
            .await;
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(orders)
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        Ok(self.collect(|order| order.status() == status).await)
    }

    async fn find_needing_reconciliation(&self) -> Result<Vec<Order>> {
        Ok(self.collect(Order::needs_reconciliation).await)
    }

    async fn find_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let mut orders = self
            .collect(|order| created_within(order, from, to))
            .await;
        orders.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(orders)
    }

    async fn find_overdue_deliveries(&self, now: DateTime<Utc>) -> Result<Vec<Order>> {
        let mut orders = self
            .collect(|order| {
                order.status() == OrderStatus::Shipped
                    && order.estimated_delivery().is_some_and(|at| at < now)
            })
            .await;
        orders.sort_by_key(|order| (order.estimated_delivery(), order.id()));
        Ok(orders)
    }

    async fn sales_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Money> {
        Ok(self
            .collect(|order| {
                SALES_STATUSES.contains(&order.status()) && created_within(order, from, to)
            })
            .await
            .iter()
            .map(Order::total_amount)
            .sum())
    }

    async fn statistics(&self, as_of: DateTime<Utc>) -> Result<OrderStatistics> {
        let (start, end) = day_bounds(as_of);
        let inner = self.inner.read().await;

        let today: Vec<&Order> = inner
            .orders
            .values()
            .filter(|order| order.created_at().is_some_and(|at| at >= start && at < end))
            .collect();
        let sales_today = today
            .iter()
            .filter(|order| SALES_STATUSES.contains(&order.status()))
            .map(|order| order.total_amount())
            .sum();

        Ok(OrderStatistics::from_status_totals(
            inner
                .orders
                .values()
                .map(|order| (order.status(), 1, order.total_amount())),
        )
        .with_today(today.len() as u64, sales_today))
    }
}

fn created_within(order: &Order, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
    order
        .created_at()
        .is_some_and(|at| from <= at && at <= to)
}

#[cfg(test)]
mod tests {
    use common::ProductId;
    use chrono::Duration;
    use domain::{Aggregate, OrderDetails, OrderItem, OrderNumberGenerator, ProductSnapshot};

    use super::*;

    fn placed(user: i64, number: &str) -> Order {
        let mut order = Order::default();
        let events = order
            .place(
                OrderNumber::new(number),
                UserId::new(user),
                OrderDetails::new("1 Main Street"),
                vec![OrderItem::new(
                    ProductSnapshot::new(ProductId::new(1), "Widget"),
                    2,
                    Money::from_cents(1000),
                )],
            )
            .unwrap();
        order.apply_events(events);
        order
    }

    #[tokio::test]
    async fn save_assigns_id_and_first_version() {
        let store = InMemoryOrderStore::new();
        let mut order = placed(1, "ORD1");

        let version = store.save(&mut order).await.unwrap();

        assert_eq!(version, Version::first());
        assert_eq!(order.id(), Some(OrderId::new(1)));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn save_unplaced_order_fails() {
        let store = InMemoryOrderStore::new();
        let result = store.save(&mut Order::default()).await;
        assert!(matches!(result, Err(StoreError::NotPlaced)));
    }

    #[tokio::test]
    async fn update_increments_version() {
        let store = InMemoryOrderStore::new();
        let mut order = placed(1, "ORD1");
        store.save(&mut order).await.unwrap();

        order.apply_events(order.confirm().unwrap());
        let version = store.save(&mut order).await.unwrap();

        assert_eq!(version, Version::new(2));
        let stored = store.find_by_id(order.id().unwrap()).await.unwrap().unwrap();
        assert_eq!(stored.status(), OrderStatus::Confirmed);
        assert_eq!(stored.version(), Version::new(2));
    }

    #[tokio::test]
    async fn concurrency_conflict_on_stale_version() {
        let store = InMemoryOrderStore::new();
        let mut order = placed(1, "ORD1");
        store.save(&mut order).await.unwrap();

        let mut first = order.clone();
        let mut second = order.clone();

        first.apply_events(first.confirm().unwrap());
        store.save(&mut first).await.unwrap();

        second.apply_events(second.cancel(None).unwrap());
        let result = store.save(&mut second).await;

        assert!(matches!(
            result,
            Err(StoreError::ConcurrencyConflict { expected, actual, .. })
                if expected == Version::first() && actual == Version::new(2)
        ));
    }

    #[tokio::test]
    async fn duplicate_order_number_rejected() {
        let store = InMemoryOrderStore::new();
        store.save(&mut placed(1, "ORD1")).await.unwrap();

        let result = store.save(&mut placed(2, "ORD1")).await;

        assert!(matches!(result, Err(StoreError::DuplicateOrderNumber(n)) if n.as_str() == "ORD1"));
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn lookups_by_number_and_user() {
        let store = InMemoryOrderStore::new();
        let generator = OrderNumberGenerator::new();
        let first_number = generator.generate();
        let mut first = placed(7, first_number.as_str());
        store.save(&mut first).await.unwrap();
        let mut second = placed(7, generator.generate().as_str());
        store.save(&mut second).await.unwrap();
        store.save(&mut placed(8, "ORD-OTHER")).await.unwrap();

        assert!(store.exists_by_number(&first_number).await.unwrap());
        assert!(!store.exists_by_number(&OrderNumber::new("ORD-NONE")).await.unwrap());
        let found = store.find_by_number(&first_number).await.unwrap().unwrap();
        assert_eq!(found.id(), first.id());

        let mine = store.find_by_user(UserId::new(7)).await.unwrap();
        let ids: Vec<_> = mine.iter().map(Order::id).collect();
        assert_eq!(ids, vec![second.id(), first.id()]);
    }

    #[tokio::test]
    async fn reconciliation_and_statistics() {
        let store = InMemoryOrderStore::new();
        let mut flagged = placed(1, "ORD1");
        store.save(&mut flagged).await.unwrap();
        let events = flagged
            .flag_stock_reservation_failure(ProductId::new(1), "out of stock", vec![], vec![])
            .unwrap();
        flagged.apply_events(events);
        store.save(&mut flagged).await.unwrap();

        let mut cancelled = placed(1, "ORD2");
        cancelled.apply_events(cancelled.cancel(None).unwrap());
        store.save(&mut cancelled).await.unwrap();

        let pending = store.find_needing_reconciliation().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id(), flagged.id());

        let stats = store
            .statistics(cancelled.created_at().unwrap())
            .await
            .unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.count(OrderStatus::Pending), 1);
        assert_eq!(stats.count(OrderStatus::Cancelled), 1);
        assert_eq!(stats.average_order_value, Money::from_cents(2000));
        assert_eq!(stats.orders_today, 2);
        assert_eq!(stats.sales_today, Money::zero());

        let tomorrow = cancelled.created_at().unwrap() + Duration::days(1);
        let stats = store.statistics(tomorrow).await.unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.orders_today, 0);

        let by_status = store.find_by_status(OrderStatus::Cancelled).await.unwrap();
        assert_eq!(by_status.len(), 1);
    }

    fn shipped(user: i64, number: &str) -> Order {
        let mut order = placed(user, number);
        order.apply_events(order.confirm().unwrap());
        order.apply_events(order.start_processing().unwrap());
        order.apply_events(order.ship().unwrap());
        order
    }

    #[tokio::test]
    async fn date_range_overdue_and_sales() {
        let store = InMemoryOrderStore::new();
        let mut first = shipped(1, "ORD1");
        store.save(&mut first).await.unwrap();
        let mut second = placed(2, "ORD2");
        store.save(&mut second).await.unwrap();

        let from = first.created_at().unwrap();
        let to = second.created_at().unwrap();

        let in_range = store.find_by_date_range(from, to).await.unwrap();
        let ids: Vec<_> = in_range.iter().map(Order::id).collect();
        assert_eq!(ids, vec![second.id(), first.id()]);
        assert!(
            store
                .find_by_date_range(to + Duration::seconds(1), to + Duration::days(1))
                .await
                .unwrap()
                .is_empty()
        );

        // Only the shipped order counts as a sale.
        assert_eq!(
            store.sales_between(from, to).await.unwrap(),
            Money::from_cents(2000)
        );

        let due = first.estimated_delivery().unwrap();
        assert!(store.find_overdue_deliveries(due).await.unwrap().is_empty());
        let overdue = store
            .find_overdue_deliveries(due + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id(), first.id());

        first.apply_events(first.deliver().unwrap());
        store.save(&mut first).await.unwrap();
        assert!(
            store
                .find_overdue_deliveries(due + Duration::days(1))
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            store.sales_between(from, to).await.unwrap(),
            Money::from_cents(2000)
        );
    }
}
