//! Clients that bound collaborator calls with timeouts and map their errors.

pub mod stock;
pub mod user;

pub use stock::{ReleaseOutcome, StockReservationClient};
pub use user::UserValidationClient;
