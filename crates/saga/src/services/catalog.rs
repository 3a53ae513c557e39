//! Product catalog trait and in-memory implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::ProductId;
use domain::{Money, ProductSnapshot};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{read, write};

/// A product as reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub id: ProductId,
    pub name: String,
    pub sku: Option<String>,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub image_url: Option<String>,
    pub price: Money,
    /// Listed in the catalog at all.
    pub active: bool,
    /// Currently sold.
    pub available: bool,
}

impl CatalogProduct {
    /// Creates an active, available product.
    pub fn new(id: ProductId, name: impl Into<String>, price: Money) -> Self {
        Self {
            id,
            name: name.into(),
            sku: None,
            category: None,
            brand: None,
            image_url: None,
            price,
            active: true,
            available: true,
        }
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Copies the fields an order line keeps.
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            product_id: self.id,
            name: self.name.clone(),
            sku: self.sku.clone(),
            category: self.category.clone(),
            brand: self.brand.clone(),
            image_url: self.image_url.clone(),
        }
    }
}

/// Direction of a stock adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockDirection {
    /// Take units out of stock (reservation).
    Reduce,
    /// Put units back into stock (release).
    Increase,
}

impl StockDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockDirection::Reduce => "REDUCE",
            StockDirection::Increase => "INCREASE",
        }
    }
}

impl std::fmt::Display for StockDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors reported by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Product not found: {0}")]
    NotFound(ProductId),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Access to the products service.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Fetches a product by id.
    async fn get_product(&self, product_id: ProductId) -> Result<CatalogProduct, CatalogError>;

    /// Returns true if at least `quantity` units are in stock.
    async fn check_stock(&self, product_id: ProductId, quantity: u32)
    -> Result<bool, CatalogError>;

    /// Adjusts the stock level of a product.
    async fn adjust_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
        direction: StockDirection,
    ) -> Result<(), CatalogError>;
}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    products: HashMap<ProductId, CatalogProduct>,
    stock: HashMap<ProductId, u32>,
    /// Products whose reductions fail as if stock ran out after the check.
    failing_reservations: HashSet<ProductId>,
    /// Number of upcoming increases that fail.
    failing_releases: u32,
    unavailable: bool,
    latency: Duration,
    adjustments: Vec<(ProductId, u32, StockDirection)>,
}

/// In-memory catalog for testing.
///
/// Only successful adjustments are recorded in [`InMemoryCatalog::adjustments`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product with the given stock level.
    pub fn add_product(&self, product: CatalogProduct, stock: u32) {
        let mut state = write(&self.state);
        state.stock.insert(product.id, stock);
        state.products.insert(product.id, product);
    }

    /// Returns the stock level of a product.
    pub fn stock_of(&self, product_id: ProductId) -> Option<u32> {
        read(&self.state).stock.get(&product_id).copied()
    }

    /// Makes every reduction of `product_id` fail with insufficient stock.
    pub fn fail_reservations_of(&self, product_id: ProductId) {
        write(&self.state).failing_reservations.insert(product_id);
    }

    /// Makes the next `count` increases fail.
    pub fn fail_next_releases(&self, count: u32) {
        write(&self.state).failing_releases = count;
    }

    /// Makes every call fail as if the service could not be reached.
    pub fn set_unavailable(&self, unavailable: bool) {
        write(&self.state).unavailable = unavailable;
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        write(&self.state).latency = latency;
    }

    /// Returns the successful stock adjustments in call order.
    pub fn adjustments(&self) -> Vec<(ProductId, u32, StockDirection)> {
        read(&self.state).adjustments.clone()
    }

    async fn simulate_call(&self) -> Result<(), CatalogError> {
        let latency = read(&self.state).latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if read(&self.state).unavailable {
            return Err(CatalogError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn get_product(&self, product_id: ProductId) -> Result<CatalogProduct, CatalogError> {
        self.simulate_call().await?;
        read(&self.state)
            .products
            .get(&product_id)
            .cloned()
            .ok_or(CatalogError::NotFound(product_id))
    }

    async fn check_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, CatalogError> {
        self.simulate_call().await?;
        let state = read(&self.state);
        let stock = state
            .stock
            .get(&product_id)
            .ok_or(CatalogError::NotFound(product_id))?;
        Ok(*stock >= quantity)
    }

    async fn adjust_stock(
        &self,
        product_id: ProductId,
        quantity: u32,
        direction: StockDirection,
    ) -> Result<(), CatalogError> {
        self.simulate_call().await?;
        let mut state = write(&self.state);

        let available = *state
            .stock
            .get(&product_id)
            .ok_or(CatalogError::NotFound(product_id))?;

        let updated = match direction {
            StockDirection::Reduce => {
                if state.failing_reservations.contains(&product_id) || available < quantity {
                    return Err(CatalogError::InsufficientStock {
                        product_id,
                        requested: quantity,
                        available,
                    });
                }
                available - quantity
            }
            StockDirection::Increase => {
                if state.failing_releases > 0 {
                    state.failing_releases -= 1;
                    return Err(CatalogError::Unavailable(
                        "stock update rejected".to_string(),
                    ));
                }
                available.saturating_add(quantity)
            }
        };

        state.stock.insert(product_id, updated);
        state.adjustments.push((product_id, quantity, direction));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with_widget(stock: u32) -> InMemoryCatalog {
        let catalog = InMemoryCatalog::new();
        catalog.add_product(
            CatalogProduct::new(ProductId::new(10), "Widget", Money::from_cents(1999))
                .with_sku("WID-10"),
            stock,
        );
        catalog
    }

    #[tokio::test]
    async fn test_reduce_and_increase() {
        let catalog = catalog_with_widget(5);
        let id = ProductId::new(10);

        catalog
            .adjust_stock(id, 3, StockDirection::Reduce)
            .await
            .unwrap();
        assert_eq!(catalog.stock_of(id), Some(2));

        catalog
            .adjust_stock(id, 3, StockDirection::Increase)
            .await
            .unwrap();
        assert_eq!(catalog.stock_of(id), Some(5));
        assert_eq!(catalog.adjustments().len(), 2);
    }

    #[tokio::test]
    async fn test_reduce_beyond_stock_fails() {
        let catalog = catalog_with_widget(1);
        let result = catalog
            .adjust_stock(ProductId::new(10), 2, StockDirection::Reduce)
            .await;
        assert!(matches!(
            result,
            Err(CatalogError::InsufficientStock { available: 1, .. })
        ));
        assert_eq!(catalog.stock_of(ProductId::new(10)), Some(1));
    }

    #[tokio::test]
    async fn test_check_stock() {
        let catalog = catalog_with_widget(2);
        assert!(catalog.check_stock(ProductId::new(10), 2).await.unwrap());
        assert!(!catalog.check_stock(ProductId::new(10), 3).await.unwrap());
        assert_eq!(
            catalog.check_stock(ProductId::new(99), 1).await,
            Err(CatalogError::NotFound(ProductId::new(99)))
        );
    }

    #[tokio::test]
    async fn test_failing_releases_are_counted_down() {
        let catalog = catalog_with_widget(0);
        catalog.fail_next_releases(1);
        let id = ProductId::new(10);

        assert!(
            catalog
                .adjust_stock(id, 1, StockDirection::Increase)
                .await
                .is_err()
        );
        catalog
            .adjust_stock(id, 1, StockDirection::Increase)
            .await
            .unwrap();
        assert_eq!(catalog.stock_of(id), Some(1));
    }

    #[test]
    fn test_snapshot_copies_catalog_fields() {
        let product = CatalogProduct::new(ProductId::new(10), "Widget", Money::from_cents(1999))
            .with_sku("WID-10");
        let snapshot = product.snapshot();
        assert_eq!(snapshot.product_id, ProductId::new(10));
        assert_eq!(snapshot.sku.as_deref(), Some("WID-10"));
    }
}
