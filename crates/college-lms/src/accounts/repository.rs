use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::domain::{NewUser, User};
use crate::ids::UserId;
use crate::storage::RepositoryError;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Fails with `Conflict` when the e-mail address is already registered.
    async fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError>;
    async fn user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    /// Marks the owner of `token` verified and clears the token.
    async fn confirm_email(&self, token: &str, at: DateTime<Utc>)
        -> Result<User, RepositoryError>;
}
