//! Human-readable order numbers.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix shared by every order number.
pub const ORDER_NUMBER_PREFIX: &str = "ORD";

/// Number of random hex characters appended to the timestamp.
pub const SUFFIX_LEN: usize = 5;

/// Human-readable order number, e.g. `ORD202610191432A3F9C`.
///
/// Layout: prefix, UTC timestamp to the minute (`yyyyMMddHHmm`), then
/// [`SUFFIX_LEN`] uppercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    /// Wraps an existing order number.
    pub fn new(number: impl Into<String>) -> Self {
        Self(number.into())
    }

    /// Returns the order number as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderNumber {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for OrderNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Generates order numbers from a monotonic minute clock and a random suffix.
///
/// The clock never moves backwards even if the wall clock does, so numbers
/// issued by one generator are ordered by their timestamp part. Uniqueness
/// across processes is still checked against the order store by the caller.
#[derive(Debug, Default)]
pub struct OrderNumberGenerator {
    last_minute: AtomicI64,
}

impl OrderNumberGenerator {
    /// Creates a new generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a candidate order number for the current time.
    pub fn generate(&self) -> OrderNumber {
        self.generate_at(Utc::now())
    }

    /// Generates a candidate order number for the given time.
    pub fn generate_at(&self, now: DateTime<Utc>) -> OrderNumber {
        let minute = now.timestamp().div_euclid(60);
        let previous = self.last_minute.fetch_max(minute, Ordering::AcqRel);
        let minute = minute.max(previous);

        let stamp = DateTime::<Utc>::from_timestamp(minute * 60, 0).unwrap_or(now);
        let suffix = Uuid::new_v4().simple().to_string()[..SUFFIX_LEN].to_uppercase();

        OrderNumber(format!(
            "{ORDER_NUMBER_PREFIX}{}{suffix}",
            stamp.format("%Y%m%d%H%M")
        ))
    }
}
