//! Order aggregate and related types.

mod aggregate;
mod events;
mod number;
mod payment;
mod state;
mod value_objects;

pub use aggregate::Order;
pub use events::{
    DEFAULT_DELIVERY_DAYS, NotesAmendedData, OrderCancelledData, OrderEvent, OrderPlacedData,
    OrderShippedData, PaymentStatusChangedData, ReconciliationNote, StatusChangedData,
};
pub use number::{ORDER_NUMBER_PREFIX, OrderNumber, OrderNumberGenerator};
pub use payment::PaymentStatus;
pub use state::{OrderStatus, Transition};
pub use value_objects::{Money, OrderDetails, OrderItem, ProductSnapshot};

use common::ProductId;
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The operation is not legal from the current status.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderStatus,
        action: &'static str,
    },

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Invalid quantity.
    #[error("Invalid quantity for product {product_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity { product_id: ProductId, quantity: u32 },

    /// Invalid price.
    #[error("Invalid price for product {product_id}: {price} (must be greater than 0)")]
    InvalidPrice { product_id: ProductId, price: Money },

    /// A line total or the order total does not fit in the money range.
    #[error("Order amount overflows at product {product_id}")]
    AmountOverflow { product_id: ProductId },

    /// Order was already placed.
    #[error("Order already placed")]
    AlreadyPlaced,
}
