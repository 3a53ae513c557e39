//! User directory trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::UserId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{read, write};

/// A user as reported by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub active: bool,
}

impl UserRecord {
    /// Creates an active user.
    pub fn active(id: UserId, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: email.into(),
            active: true,
        }
    }

    /// Marks the user as inactive.
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }
}

/// Errors reported by the user directory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("User not found: {0}")]
    NotFound(UserId),

    #[error("User directory unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the users service.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fetches a user by id.
    async fn get_user(&self, user_id: UserId) -> Result<UserRecord, DirectoryError>;
}

#[derive(Debug, Default)]
struct InMemoryDirectoryState {
    users: HashMap<UserId, UserRecord>,
    unavailable: bool,
    latency: Duration,
    calls: usize,
}

/// In-memory user directory for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    state: Arc<RwLock<InMemoryDirectoryState>>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user.
    pub fn add_user(&self, user: UserRecord) {
        write(&self.state).users.insert(user.id, user);
    }

    /// Makes every call fail as if the service could not be reached.
    pub fn set_unavailable(&self, unavailable: bool) {
        write(&self.state).unavailable = unavailable;
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        write(&self.state).latency = latency;
    }

    /// Returns how many lookups were made.
    pub fn call_count(&self) -> usize {
        read(&self.state).calls
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn get_user(&self, user_id: UserId) -> Result<UserRecord, DirectoryError> {
        let latency = {
            let mut state = write(&self.state);
            state.calls += 1;
            state.latency
        };
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let state = read(&self.state);
        if state.unavailable {
            return Err(DirectoryError::Unavailable(
                "connection refused".to_string(),
            ));
        }

        state
            .users
            .get(&user_id)
            .cloned()
            .ok_or(DirectoryError::NotFound(user_id))
    }
}
