//! Order creation requests and their shape validation.

use common::{ProductId, UserId};
use domain::OrderDetails;
use serde::{Deserialize, Serialize};

use crate::error::CreateOrderError;

pub const MAX_SHIPPING_ADDRESS_LEN: usize = 500;
pub const MAX_PAYMENT_METHOD_LEN: usize = 50;
pub const MAX_NOTES_LEN: usize = 1000;
pub const MAX_LINE_NOTES_LEN: usize = 500;
pub const MAX_REASON_LEN: usize = 500;

/// A request to create an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: UserId,
    pub shipping_address: String,
    pub payment_method: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<OrderLineRequest>,
}

/// One requested line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    pub notes: Option<String>,
}

impl OrderLineRequest {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            quantity,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl CreateOrderRequest {
    /// Creates a request with no optional fields set.
    pub fn new(
        user_id: UserId,
        shipping_address: impl Into<String>,
        items: Vec<OrderLineRequest>,
    ) -> Self {
        Self {
            user_id,
            shipping_address: shipping_address.into(),
            payment_method: None,
            notes: None,
            items,
        }
    }

    pub fn with_payment_method(mut self, payment_method: impl Into<String>) -> Self {
        self.payment_method = Some(payment_method.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Checks the request shape without calling any collaborator.
    pub fn validate(&self) -> Result<(), CreateOrderError> {
        if self.items.is_empty() {
            return Err(invalid("order must contain at least one item"));
        }

        if self.shipping_address.trim().is_empty() {
            return Err(invalid("shipping address is required"));
        }
        check_len("shipping address", &self.shipping_address, MAX_SHIPPING_ADDRESS_LEN)
            .map_err(invalid)?;
        check_optional_len(
            "payment method",
            self.payment_method.as_deref(),
            MAX_PAYMENT_METHOD_LEN,
        )
        .map_err(invalid)?;
        check_optional_len("notes", self.notes.as_deref(), MAX_NOTES_LEN).map_err(invalid)?;

        for line in &self.items {
            if line.quantity == 0 {
                return Err(invalid(format!(
                    "quantity for product {} must be at least 1",
                    line.product_id
                )));
            }
            check_optional_len("item notes", line.notes.as_deref(), MAX_LINE_NOTES_LEN)
                .map_err(invalid)?;
        }

        Ok(())
    }

    /// Returns the buyer-supplied details recorded on the order.
    pub fn details(&self) -> OrderDetails {
        OrderDetails {
            shipping_address: self.shipping_address.trim().to_string(),
            payment_method: self.payment_method.clone(),
            notes: self.notes.clone(),
        }
    }
}

fn invalid(message: impl Into<String>) -> CreateOrderError {
    CreateOrderError::Validation(message.into())
}

pub(crate) fn check_len(field: &str, value: &str, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len > max {
        return Err(format!("{field} must be at most {max} characters (got {len})"));
    }
    Ok(())
}

pub(crate) fn check_optional_len(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> Result<(), String> {
    value.map_or(Ok(()), |value| check_len(field, value, max))
}
