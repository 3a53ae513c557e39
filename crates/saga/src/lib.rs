//! Order creation saga and order status coordination.
//!
//! Creating an order runs these steps:
//! 1. Validate the buyer against the user directory
//! 2. Validate every line against the catalog and build the order lines
//! 3. Persist the pending order under a fresh order number
//! 4. Reserve stock line by line
//!
//! If a reservation fails, lines reserved so far are released in reverse order
//! and the persisted order is flagged for reconciliation.
//!
//! Once persisted, orders move through their lifecycle via
//! [`OrderStatusCoordinator`], which releases stock on cancellation.

pub mod aggregate;
pub mod clients;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod orchestrator;
pub mod request;
pub mod services;
pub mod state;
pub mod steps;
pub mod telemetry;

pub use aggregate::SagaInstance;
pub use clients::{ReleaseOutcome, StockReservationClient, UserValidationClient};
pub use config::{Config, LogFormat, SagaConfig};
pub use coordinator::OrderStatusCoordinator;
pub use error::{
    CreateOrderError, ErrorKind, OrderRef, StockError, TransitionError, UserValidationError,
};
pub use events::SagaEvent;
pub use orchestrator::{OrderCreationOrchestrator, SagaOutcome};
pub use request::{CreateOrderRequest, OrderLineRequest};
pub use services::{
    Catalog, CatalogError, CatalogProduct, DirectoryError, InMemoryCatalog,
    InMemoryUserDirectory, StockDirection, UserDirectory, UserRecord,
};
pub use state::SagaState;
pub use steps::{Compensation, CreationStep};
