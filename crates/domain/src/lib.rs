//! Domain layer for the order services.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits
//! - The Order aggregate with its lifecycle state machine
//! - Order line value objects, money and order numbers

pub mod aggregate;
pub mod order;

pub use aggregate::{Aggregate, DomainEvent};
pub use order::{
    Money, Order, OrderDetails, OrderError, OrderEvent, OrderItem, OrderNumber,
    OrderNumberGenerator, OrderStatus, PaymentStatus, ProductSnapshot, ReconciliationNote,
    Transition,
};
