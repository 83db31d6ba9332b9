use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use super::domain::{NewUser, Registration, Role, User};
use super::repository::AccountRepository;
use crate::notifications::{dispatch_logged, EmailTemplate, Notification, NotificationDispatcher};
use crate::storage::RepositoryError;
use crate::web::UserFacing;

pub struct AccountService<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
}

impl<R, N> AccountService<R, N>
where
    R: AccountRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(repository: Arc<R>, notifier: Arc<N>) -> Self {
        Self {
            repository,
            notifier,
        }
    }

    /// Self-service sign-up always creates a student account.
    pub async fn register(&self, registration: Registration) -> Result<User, AccountError> {
        self.create_user(registration, Role::Student).await
    }

    pub async fn create_user(
        &self,
        registration: Registration,
        role: Role,
    ) -> Result<User, AccountError> {
        let name = registration.name.trim().to_string();
        if name.is_empty() {
            return Err(AccountError::InvalidRegistration("name is required"));
        }
        let email = normalize_email(&registration.email)
            .ok_or(AccountError::InvalidRegistration("e-mail address is malformed"))?;

        let token = Uuid::new_v4().simple().to_string();
        let user = self
            .repository
            .insert_user(NewUser {
                name,
                email,
                role,
                verification_token: token.clone(),
                created_at: Utc::now(),
            })
            .await
            .map_err(|err| match err {
                RepositoryError::Conflict(_) => AccountError::EmailTaken,
                other => AccountError::Repository(other),
            })?;

        info!(user = %user.id, role = user.role.label(), "account registered");

        dispatch_logged(
            self.notifier.as_ref(),
            Notification::new(EmailTemplate::Welcome, user.id)
                .with("name", &user.name)
                .with("email", &user.email),
        );
        dispatch_logged(
            self.notifier.as_ref(),
            Notification::new(EmailTemplate::VerifyEmail, user.id)
                .with("email", &user.email)
                .with("token", &token),
        );

        Ok(user)
    }

    pub async fn verify_email(&self, token: &str) -> Result<User, AccountError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(AccountError::UnknownToken);
        }
        let user = self
            .repository
            .confirm_email(token, Utc::now())
            .await
            .map_err(|err| match err {
                RepositoryError::NotFound => AccountError::UnknownToken,
                other => AccountError::Repository(other),
            })?;
        info!(user = %user.id, "e-mail verified");
        Ok(user)
    }
}

fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_ascii_lowercase();
    let (local, domain) = email.split_once('@')?;
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.')
    {
        return None;
    }
    if email.chars().any(char::is_whitespace) {
        return None;
    }
    Some(email)
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("invalid registration: {0}")]
    InvalidRegistration(&'static str),
    #[error("that e-mail address is already registered")]
    EmailTaken,
    #[error("verification link is invalid or already used")]
    UnknownToken,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl UserFacing for AccountError {
    fn is_internal(&self) -> bool {
        matches!(self, AccountError::Repository(err) if err.is_internal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalization() {
        assert_eq!(
            normalize_email("  Ada@Example.ORG ").as_deref(),
            Some("ada@example.org")
        );
        assert!(normalize_email("no-at-sign").is_none());
        assert!(normalize_email("a@localhost").is_none());
        assert!(normalize_email("a b@x.org").is_none());
    }
}
