//! Collaborator traits and in-memory implementations used by the order saga.

pub mod catalog;
pub mod user;

pub use catalog::{Catalog, CatalogError, CatalogProduct, InMemoryCatalog, StockDirection};
pub use user::{DirectoryError, InMemoryUserDirectory, UserDirectory, UserRecord};

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

// A panic while holding the lock leaves plain data behind; keep serving it.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
