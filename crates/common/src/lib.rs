//! Shared identifier and version types.

pub mod types;

pub use types::{OrderId, ProductId, UserId, Version};
