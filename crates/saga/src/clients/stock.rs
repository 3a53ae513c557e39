//! Stock checks, reservations and releases against the catalog.

use std::future::Future;
use std::time::Duration;

use common::ProductId;

use crate::config::SagaConfig;
use crate::error::StockError;
use crate::services::catalog::{Catalog, CatalogError, CatalogProduct, StockDirection};

/// Result of a best-effort stock release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released { attempts: u32 },
    Failed { attempts: u32, error: StockError },
}

impl ReleaseOutcome {
    pub fn is_released(&self) -> bool {
        matches!(self, ReleaseOutcome::Released { .. })
    }
}

/// Wraps a [`Catalog`] with timeouts and the release retry policy.
///
/// Reservations are a single call each. Releases are retried up to
/// `release_attempts` times and never return an error.
#[derive(Debug, Clone)]
pub struct StockReservationClient<C> {
    catalog: C,
    timeout: Duration,
    release_attempts: u32,
    release_backoff: Duration,
}

impl<C: Catalog> StockReservationClient<C> {
    pub fn new(catalog: C, config: &SagaConfig) -> Self {
        Self {
            catalog,
            timeout: config.call_timeout,
            release_attempts: config.release_attempts.max(1),
            release_backoff: config.release_backoff,
        }
    }

    /// Fetches the product data used to build an order line.
    pub async fn product(&self, product_id: ProductId) -> Result<CatalogProduct, StockError> {
        self.call("product lookup", self.catalog.get_product(product_id))
            .await
            .map_err(|e| Self::map_error(e, 0))
    }

    /// Returns true if `quantity` units are currently in stock.
    pub async fn check_availability(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<bool, StockError> {
        self.call("stock check", self.catalog.check_stock(product_id, quantity))
            .await
            .map_err(|e| Self::map_error(e, quantity))
    }

    /// Takes `quantity` units out of stock.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, product_id: ProductId, quantity: u32) -> Result<(), StockError> {
        self.call(
            "stock reservation",
            self.catalog
                .adjust_stock(product_id, quantity, StockDirection::Reduce),
        )
        .await
        .map_err(|e| Self::map_error(e, quantity))
    }

    /// Puts `quantity` units back into stock, best effort.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, product_id: ProductId, quantity: u32) -> ReleaseOutcome {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .call(
                    "stock release",
                    self.catalog
                        .adjust_stock(product_id, quantity, StockDirection::Increase),
                )
                .await
                .map_err(|e| Self::map_error(e, quantity));

            match result {
                Ok(()) => {
                    tracing::debug!(%product_id, quantity, attempt, "stock released");
                    return ReleaseOutcome::Released { attempts: attempt };
                }
                Err(error) if attempt < self.release_attempts => {
                    tracing::warn!(
                        %product_id,
                        quantity,
                        attempt,
                        %error,
                        "stock release failed, retrying"
                    );
                    tokio::time::sleep(self.release_backoff).await;
                }
                Err(error) => {
                    tracing::error!(
                        %product_id,
                        quantity,
                        attempt,
                        %error,
                        "stock release failed, giving up"
                    );
                    metrics::counter!("stock_release_failed_total").increment(1);
                    return ReleaseOutcome::Failed {
                        attempts: attempt,
                        error,
                    };
                }
            }
        }
    }

    async fn call<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = Result<T, CatalogError>>,
    ) -> Result<T, CatalogError> {
        tokio::time::timeout(self.timeout, future)
            .await
            .map_err(|_| {
                CatalogError::Unavailable(format!(
                    "{operation} timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })?
    }

    fn map_error(error: CatalogError, requested: u32) -> StockError {
        match error {
            CatalogError::NotFound(product_id) => StockError::ProductNotFound(product_id),
            CatalogError::InsufficientStock { product_id, .. } => StockError::InsufficientStock {
                product_id,
                requested,
            },
            CatalogError::Unavailable(reason) => StockError::CommunicationFailure(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use domain::Money;

    use super::*;
    use crate::services::catalog::InMemoryCatalog;

    fn setup(stock: u32) -> (StockReservationClient<InMemoryCatalog>, InMemoryCatalog) {
        let catalog = InMemoryCatalog::new();
        catalog.add_product(
            CatalogProduct::new(ProductId::new(10), "Widget", Money::from_cents(1999)),
            stock,
        );
        let config = SagaConfig {
            call_timeout: Duration::from_millis(50),
            release_attempts: 3,
            release_backoff: Duration::from_millis(1),
            ..SagaConfig::default()
        };
        (StockReservationClient::new(catalog.clone(), &config), catalog)
    }

    #[tokio::test]
    async fn test_reserve_then_release() {
        let (client, catalog) = setup(5);
        let id = ProductId::new(10);

        client.reserve(id, 2).await.unwrap();
        assert_eq!(catalog.stock_of(id), Some(3));

        let outcome = client.release(id, 2).await;
        assert_eq!(outcome, ReleaseOutcome::Released { attempts: 1 });
        assert_eq!(catalog.stock_of(id), Some(5));
    }

    #[tokio::test]
    async fn test_reserve_maps_catalog_errors() {
        let (client, _) = setup(1);

        assert_eq!(
            client.reserve(ProductId::new(10), 2).await,
            Err(StockError::InsufficientStock {
                product_id: ProductId::new(10),
                requested: 2
            })
        );
        assert_eq!(
            client.reserve(ProductId::new(99), 1).await,
            Err(StockError::ProductNotFound(ProductId::new(99)))
        );
    }

    #[tokio::test]
    async fn test_release_retries_until_success() {
        let (client, catalog) = setup(0);
        catalog.fail_next_releases(2);

        let outcome = client.release(ProductId::new(10), 1).await;
        assert_eq!(outcome, ReleaseOutcome::Released { attempts: 3 });
        assert_eq!(catalog.stock_of(ProductId::new(10)), Some(1));
    }

    #[tokio::test]
    async fn test_release_gives_up_after_bounded_attempts() {
        let (client, catalog) = setup(0);
        catalog.fail_next_releases(10);

        let outcome = client.release(ProductId::new(10), 1).await;
        assert!(matches!(outcome, ReleaseOutcome::Failed { attempts: 3, .. }));
        assert_eq!(catalog.stock_of(ProductId::new(10)), Some(0));
    }

    #[tokio::test]
    async fn test_slow_catalog_is_a_communication_failure() {
        let (client, catalog) = setup(5);
        catalog.set_latency(Duration::from_millis(200));

        let result = client.check_availability(ProductId::new(10), 1).await;
        assert!(matches!(result, Err(StockError::CommunicationFailure(_))));
    }
}
