use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::MemoryStore;
use crate::accounts::{AccountRepository, NewUser, User};
use crate::ids::UserId;
use crate::storage::RepositoryError;

#[async_trait]
impl AccountRepository for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.users.values().any(|existing| existing.email == user.email) {
            return Err(RepositoryError::Conflict(format!("users.email {}", user.email)));
        }
        let id = UserId(tables.next_id("users"));
        let record = User {
            id,
            name: user.name,
            email: user.email,
            role: user.role,
            email_verified_at: None,
            verification_token: Some(user.verification_token),
            created_at: user.created_at,
        };
        tables.users.insert(id, record.clone());
        Ok(record)
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn confirm_email(&self, token: &str, at: DateTime<Utc>) -> Result<User, RepositoryError> {
        let mut tables = self.lock()?;
        let user = tables
            .users
            .values_mut()
            .find(|user| user.verification_token.as_deref() == Some(token))
            .ok_or(RepositoryError::NotFound)?;
        user.email_verified_at = Some(at);
        user.verification_token = None;
        Ok(user.clone())
    }
}
