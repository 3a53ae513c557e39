//! Buyer validation against the user directory.

use std::time::Duration;

use common::UserId;

use crate::error::UserValidationError;
use crate::services::user::{DirectoryError, UserDirectory, UserRecord};

/// Validates that a user exists and is active.
///
/// One call per validation, bounded by `timeout`. Never retried.
#[derive(Debug, Clone)]
pub struct UserValidationClient<D> {
    directory: D,
    timeout: Duration,
}

impl<D: UserDirectory> UserValidationClient<D> {
    pub fn new(directory: D, timeout: Duration) -> Self {
        Self { directory, timeout }
    }

    /// Returns the user if it exists and is active.
    #[tracing::instrument(skip(self))]
    pub async fn validate(&self, user_id: UserId) -> Result<UserRecord, UserValidationError> {
        let user = tokio::time::timeout(self.timeout, self.directory.get_user(user_id))
            .await
            .map_err(|_| {
                UserValidationError::CommunicationFailure(format!(
                    "user lookup timed out after {}ms",
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| match e {
                DirectoryError::NotFound(id) => UserValidationError::UserNotFound(id),
                DirectoryError::Unavailable(reason) => {
                    UserValidationError::CommunicationFailure(reason)
                }
            })?;

        if !user.active {
            tracing::debug!(%user_id, "user is inactive");
            return Err(UserValidationError::UserInactive(user_id));
        }

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::user::InMemoryUserDirectory;

    fn client() -> (UserValidationClient<InMemoryUserDirectory>, InMemoryUserDirectory) {
        let directory = InMemoryUserDirectory::new();
        directory.add_user(UserRecord::active(UserId::new(1), "Ana", "ana@example.com"));
        directory.add_user(
            UserRecord::active(UserId::new(2), "Bruno", "bruno@example.com").deactivated(),
        );
        (
            UserValidationClient::new(directory.clone(), Duration::from_millis(50)),
            directory,
        )
    }

    #[tokio::test]
    async fn test_active_user_is_valid() {
        let (client, _) = client();
        let user = client.validate(UserId::new(1)).await.unwrap();
        assert_eq!(user.name, "Ana");
    }

    #[tokio::test]
    async fn test_unknown_and_inactive_users_are_rejected() {
        let (client, _) = client();
        assert_eq!(
            client.validate(UserId::new(9)).await,
            Err(UserValidationError::UserNotFound(UserId::new(9)))
        );
        assert_eq!(
            client.validate(UserId::new(2)).await,
            Err(UserValidationError::UserInactive(UserId::new(2)))
        );
    }

    #[tokio::test]
    async fn test_timeout_is_a_communication_failure() {
        let (client, directory) = client();
        directory.set_latency(Duration::from_millis(200));

        let result = client.validate(UserId::new(1)).await;
        assert!(matches!(
            result,
            Err(UserValidationError::CommunicationFailure(_))
        ));
        assert_eq!(directory.call_count(), 1);
    }
}
