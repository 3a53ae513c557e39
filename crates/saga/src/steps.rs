//! Order creation saga steps and their compensations.

use common::ProductId;
use serde::{Deserialize, Serialize};

/// The saga type identifier for order creation.
pub const SAGA_TYPE: &str = "OrderCreation";

/// Steps of the order creation saga, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationStep {
    /// Check that the buyer exists and is active.
    ValidateUser,
    /// Look up every product, check availability and build the lines.
    ValidateItems,
    /// Allocate an order number and persist the pending order.
    PersistOrder,
    /// Reserve stock line by line.
    ReserveStock,
}

impl CreationStep {
    pub const ALL: [CreationStep; 4] = [
        CreationStep::ValidateUser,
        CreationStep::ValidateItems,
        CreationStep::PersistOrder,
        CreationStep::ReserveStock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CreationStep::ValidateUser => "validate_user",
            CreationStep::ValidateItems => "validate_items",
            CreationStep::PersistOrder => "persist_order",
            CreationStep::ReserveStock => "reserve_stock",
        }
    }
}

impl std::fmt::Display for CreationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An action that undoes a completed piece of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Compensation {
    /// Put reserved units back into stock.
    ReleaseStock { product_id: ProductId, quantity: u32 },
}

impl Compensation {
    pub fn product_id(&self) -> ProductId {
        match self {
            Compensation::ReleaseStock { product_id, .. } => *product_id,
        }
    }
}

impl std::fmt::Display for Compensation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compensation::ReleaseStock {
                product_id,
                quantity,
            } => write!(f, "release {quantity} of product {product_id}"),
        }
    }
}
