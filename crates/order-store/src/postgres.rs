use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId, Version};
use domain::{Money, Order, OrderNumber, OrderStatus};
use sqlx::{PgPool, Row, postgres::PgRow};

use crate::{
    Result, StoreError,
    store::{OrderStatistics, OrderStore, SALES_STATUSES, day_bounds, validate_for_save},
};

const ORDER_NUMBER_CONSTRAINT: &str = "orders_order_number_key";

const SELECT_ORDERS: &str = "SELECT id, version, state FROM orders";

/// PostgreSQL-backed order store implementation.
///
/// Scalar columns are kept for lookups; the full aggregate is stored as
/// JSONB. The `id` and `version` columns are authoritative on load.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let state: serde_json::Value = row.try_get("state")?;
        let mut order: Order = serde_json::from_value(state)?;
        order.mark_persisted(
            OrderId::new(row.try_get("id")?),
            Version::new(row.try_get("version")?),
        );
        Ok(order)
    }

    fn map_unique_violation(error: sqlx::Error, number: &OrderNumber) -> StoreError {
        if let sqlx::Error::Database(ref db_err) = error
            && db_err.constraint() == Some(ORDER_NUMBER_CONSTRAINT)
        {
            return StoreError::DuplicateOrderNumber(number.clone());
        }
        StoreError::Database(error)
    }

    async fn insert(&self, order: &mut Order, number: &OrderNumber) -> Result<Version> {
        let state = serde_json::to_value(&*order)?;
        let version = Version::first();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (order_number, user_id, status, payment_status, total_cents,
                                needs_reconciliation, version, state, estimated_delivery,
                                created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, COALESCE($10, NOW()))
            RETURNING id
            "#,
        )
        .bind(number.as_str())
        .bind(order.user_id().map(|id| id.as_i64()))
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.total_amount().cents())
        .bind(order.needs_reconciliation())
        .bind(version.as_i64())
        .bind(state)
        .bind(order.estimated_delivery())
        .bind(order.created_at())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::map_unique_violation(e, number))?;

        order.mark_persisted(OrderId::new(id), version);
        Ok(version)
    }

    async fn update(&self, order: &mut Order, id: OrderId, number: &OrderNumber) -> Result<Version> {
        let expected = order.version();
        let version = expected.next();
        let state = serde_json::to_value(&*order)?;

        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $1, payment_status = $2, total_cents = $3,
                needs_reconciliation = $4, version = $5, state = $6,
                estimated_delivery = $7, updated_at = NOW()
            WHERE id = $8 AND version = $9
            "#,
        )
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.total_amount().cents())
        .bind(order.needs_reconciliation())
        .bind(version.as_i64())
        .bind(state)
        .bind(order.estimated_delivery())
        .bind(id.as_i64())
        .bind(expected.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::map_unique_violation(e, number))?;

        if result.rows_affected() == 0 {
            let actual: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
                .bind(id.as_i64())
                .fetch_optional(&self.pool)
                .await?;

            return match actual {
                Some(actual) => Err(StoreError::ConcurrencyConflict {
                    order_id: id,
                    expected,
                    actual: Version::new(actual),
                }),
                None => Err(StoreError::NotFound(id)),
            };
        }

        order.mark_persisted(id, version);
        Ok(version)
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn save(&self, order: &mut Order) -> Result<Version> {
        let number = validate_for_save(order)?.clone();

        match order.id() {
            Some(id) => self.update(order, id, &number).await,
            None => self.insert(order, &number).await,
        }
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("{SELECT_ORDERS} WHERE id = $1"))
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn find_by_number(&self, number: &OrderNumber) -> Result<Option<Order>> {
        let row = sqlx::query(&format!("{SELECT_ORDERS} WHERE order_number = $1"))
            .bind(number.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn exists_by_number(&self, number: &OrderNumber) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM orders WHERE order_number = $1)")
                .bind(number.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn find_by_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "{SELECT_ORDERS} WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn find_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!("{SELECT_ORDERS} WHERE status = $1 ORDER BY id ASC"))
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn find_needing_reconciliation(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "{SELECT_ORDERS} WHERE needs_reconciliation ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn find_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "{SELECT_ORDERS} WHERE created_at BETWEEN $1 AND $2 ORDER BY created_at DESC, id DESC"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn find_overdue_deliveries(&self, now: DateTime<Utc>) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            "{SELECT_ORDERS} WHERE status = $1 AND estimated_delivery < $2 \
             ORDER BY estimated_delivery ASC, id ASC"
        ))
        .bind(OrderStatus::Shipped.as_str())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn sales_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Money> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(total_cents), 0)::BIGINT
            FROM orders
            WHERE status = ANY($1) AND created_at BETWEEN $2 AND $3
            "#,
        )
        .bind(sales_statuses())
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(Money::from_cents(total))
    }

    async fn statistics(&self, as_of: DateTime<Utc>) -> Result<OrderStatistics> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS orders, COALESCE(SUM(total_cents), 0)::BIGINT AS total
            FROM orders
            GROUP BY status
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut totals = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("status")?;
            let status = status.parse::<OrderStatus>().map_err(StoreError::InvalidRow)?;
            let orders: i64 = row.try_get("orders")?;
            let total: i64 = row.try_get("total")?;
            totals.push((
                status,
                u64::try_from(orders).unwrap_or(0),
                Money::from_cents(total),
            ));
        }

        let (start, end) = day_bounds(as_of);
        let today = sqlx::query(
            r#"
            SELECT COUNT(*) AS orders,
                   COALESCE(SUM(total_cents) FILTER (WHERE status = ANY($3)), 0)::BIGINT AS sales
            FROM orders
            WHERE created_at >= $1 AND created_at < $2
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(sales_statuses())
        .fetch_one(&self.pool)
        .await?;
        let orders_today: i64 = today.try_get("orders")?;
        let sales_today: i64 = today.try_get("sales")?;

        Ok(OrderStatistics::from_status_totals(totals).with_today(
            u64::try_from(orders_today).unwrap_or(0),
            Money::from_cents(sales_today),
        ))
    }
}

fn sales_statuses() -> Vec<&'static str> {
    SALES_STATUSES.iter().map(|status| status.as_str()).collect()
}
