//! Order persistence.
//!
//! This crate provides:
//! - The `OrderStore` trait with optimistic concurrency by version
//! - An in-memory store for tests and local runs
//! - A PostgreSQL store backed by `sqlx`

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use store::{OrderStatistics, OrderStore, OrderStoreExt, SALES_STATUSES, day_bounds};
