use common::{OrderId, Version};
use domain::OrderNumber;
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored version did not match the version the caller loaded.
    #[error("Concurrency conflict for order {order_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// Another order already uses this order number.
    #[error("Order number already in use: {0}")]
    DuplicateOrderNumber(OrderNumber),

    /// The order was not found.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The order has never been placed and cannot be stored.
    #[error("Order has not been placed")]
    NotPlaced,

    /// A stored row could not be mapped back to an order.
    #[error("Invalid stored row: {0}")]
    InvalidRow(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
