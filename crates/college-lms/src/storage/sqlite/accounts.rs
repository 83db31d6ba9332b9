use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{decode_label, decode_optional_time, decode_time, encode_time, SqliteStore};
use crate::accounts::{AccountRepository, NewUser, Role, User};
use crate::ids::UserId;
use crate::storage::RepositoryError;

const USER_COLUMNS: &str =
    "id, name, email, role, email_verified_at, verification_token, created_at";

fn user_from_row(row: &SqliteRow) -> Result<User, RepositoryError> {
    Ok(User {
        id: UserId(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: decode_label(row.try_get::<&str, _>("role")?, Role::parse)?,
        email_verified_at: decode_optional_time(row.try_get("email_verified_at")?)?,
        verification_token: row.try_get("verification_token")?,
        created_at: decode_time(row.try_get::<&str, _>("created_at")?)?,
    })
}

#[async_trait]
impl AccountRepository for SqliteStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO users (name, email, role, verification_token, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.label())
        .bind(&user.verification_token)
        .bind(encode_time(user.created_at))
        .execute(&self.pool)
        .await?;

        Ok(User {
            id: UserId(result.last_insert_rowid()),
            name: user.name,
            email: user.email,
            role: user.role,
            email_verified_at: None,
            verification_token: Some(user.verification_token),
            created_at: user.created_at,
        })
    }

    async fn user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn confirm_email(&self, token: &str, at: DateTime<Utc>) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE verification_token = ?"
        ))
        .bind(token)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;
        let mut user = user_from_row(&row)?;

        sqlx::query(
            "UPDATE users SET email_verified_at = ?, verification_token = NULL WHERE id = ?",
        )
        .bind(encode_time(at))
        .bind(user.id.0)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        user.email_verified_at = Some(at);
        user.verification_token = None;
        Ok(user)
    }
}
