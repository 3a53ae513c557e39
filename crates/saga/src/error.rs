//! Error types for order creation and status changes.

use common::{OrderId, ProductId, UserId};
use domain::{OrderError, OrderNumber};
use order_store::StoreError;
use thiserror::Error;

/// Failure categories shared by every public error of this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    ValidationFailure,
    UserInvalid,
    ProductUnavailable,
    InsufficientStock,
    CommunicationFailure,
    InvalidStateTransition,
    NotFound,
    PersistenceFailure,
}

impl ErrorKind {
    /// Returns the kind as a metrics label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationFailure => "validation_failure",
            ErrorKind::UserInvalid => "user_invalid",
            ErrorKind::ProductUnavailable => "product_unavailable",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::CommunicationFailure => "communication_failure",
            ErrorKind::InvalidStateTransition => "invalid_state_transition",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PersistenceFailure => "persistence_failure",
        }
    }

    /// Only failures to reach a collaborator may succeed when repeated as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::CommunicationFailure)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors from validating the buyer of an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UserValidationError {
    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("User is inactive: {0}")]
    UserInactive(UserId),

    #[error("User service communication failure: {0}")]
    CommunicationFailure(String),
}

impl UserValidationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UserValidationError::UserNotFound(_) | UserValidationError::UserInactive(_) => {
                ErrorKind::UserInvalid
            }
            UserValidationError::CommunicationFailure(_) => ErrorKind::CommunicationFailure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Errors from stock lookups and reservations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StockError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Insufficient stock for product {product_id}: requested {requested}")]
    InsufficientStock { product_id: ProductId, requested: u32 },

    #[error("Product service communication failure: {0}")]
    CommunicationFailure(String),
}

impl StockError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StockError::ProductNotFound(_) => ErrorKind::ProductUnavailable,
            StockError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            StockError::CommunicationFailure(_) => ErrorKind::CommunicationFailure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Errors returned by order creation.
#[derive(Debug, Error)]
pub enum CreateOrderError {
    /// The request is malformed; no collaborator was called.
    #[error("Invalid order request: {0}")]
    Validation(String),

    #[error("Invalid user: {0}")]
    UserInvalid(UserValidationError),

    #[error("Product {product_id} is unavailable: {reason}")]
    ProductUnavailable {
        product_id: ProductId,
        reason: String,
    },

    #[error("Insufficient stock for product {product_id}: requested {requested}")]
    InsufficientStock { product_id: ProductId, requested: u32 },

    #[error("Communication failure: {0}")]
    CommunicationFailure(String),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl CreateOrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CreateOrderError::Validation(_) => ErrorKind::ValidationFailure,
            CreateOrderError::UserInvalid(_) => ErrorKind::UserInvalid,
            CreateOrderError::ProductUnavailable { .. } => ErrorKind::ProductUnavailable,
            CreateOrderError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            CreateOrderError::CommunicationFailure(_) => ErrorKind::CommunicationFailure,
            CreateOrderError::Persistence(_) => ErrorKind::PersistenceFailure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<UserValidationError> for CreateOrderError {
    fn from(error: UserValidationError) -> Self {
        match error {
            UserValidationError::CommunicationFailure(reason) => {
                CreateOrderError::CommunicationFailure(reason)
            }
            invalid => CreateOrderError::UserInvalid(invalid),
        }
    }
}

impl From<StockError> for CreateOrderError {
    fn from(error: StockError) -> Self {
        match error {
            StockError::ProductNotFound(product_id) => CreateOrderError::ProductUnavailable {
                product_id,
                reason: "not found".to_string(),
            },
            StockError::InsufficientStock {
                product_id,
                requested,
            } => CreateOrderError::InsufficientStock {
                product_id,
                requested,
            },
            StockError::CommunicationFailure(reason) => {
                CreateOrderError::CommunicationFailure(reason)
            }
        }
    }
}

/// How the caller identified an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRef {
    Id(OrderId),
    Number(OrderNumber),
}

impl std::fmt::Display for OrderRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderRef::Id(id) => write!(f, "id {id}"),
            OrderRef::Number(number) => write!(f, "number {number}"),
        }
    }
}

impl From<OrderId> for OrderRef {
    fn from(id: OrderId) -> Self {
        OrderRef::Id(id)
    }
}

impl From<OrderNumber> for OrderRef {
    fn from(number: OrderNumber) -> Self {
        OrderRef::Number(number)
    }
}

/// Errors returned by status changes and lookups.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Order not found: {0}")]
    NotFound(OrderRef),

    #[error("Invalid status change request: {0}")]
    Validation(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl TransitionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransitionError::NotFound(_) => ErrorKind::NotFound,
            TransitionError::Validation(_) => ErrorKind::ValidationFailure,
            TransitionError::Order(OrderError::InvalidStateTransition { .. }) => {
                ErrorKind::InvalidStateTransition
            }
            TransitionError::Order(_) => ErrorKind::ValidationFailure,
            TransitionError::Persistence(_) => ErrorKind::PersistenceFailure,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Result type for status changes.
pub type Result<T> = std::result::Result<T, TransitionError>;
