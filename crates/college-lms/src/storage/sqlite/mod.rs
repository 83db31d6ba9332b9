//! SQLite-backed store. Every statement binds its parameters; multi-row
//! operations run inside a transaction.

mod accounts;
mod assignments;
mod catalog;
mod certificates;
mod enrollments;
mod payments;
mod quizzes;
pub mod schema;

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::storage::RepositoryError;

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database behind a `sqlite:` URL.
    /// In-memory databases get a single long-lived connection so every
    /// query sees the same data.
    pub async fn connect(url: &str) -> Result<Self, RepositoryError> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(options).await?;
        Ok(Self::new(pool))
    }

    /// Creates every table and index that does not exist yet.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        for statement in schema::TABLES.iter().chain(schema::CREATE_INDEXES) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        info!(tables = schema::TABLES.len(), "sqlite schema ready");
        Ok(())
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            other => RepositoryError::Unavailable(other.to_string()),
        }
    }
}

pub(crate) fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_time(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| corrupt("timestamp", raw, err))
}

pub(crate) fn decode_optional_time(
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.as_deref().map(decode_time).transpose()
}

pub(crate) fn decode_decimal(raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw).map_err(|err| corrupt("decimal", raw, err))
}

pub(crate) fn decode_label<T>(raw: &str, parse: fn(&str) -> Option<T>) -> Result<T, RepositoryError> {
    parse(raw).ok_or_else(|| corrupt("label", raw, "unknown value"))
}

pub(crate) fn decode_count(raw: i64) -> Result<u32, RepositoryError> {
    u32::try_from(raw).map_err(|err| corrupt("count", &raw.to_string(), err))
}

fn corrupt(kind: &str, raw: &str, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Unavailable(format!("corrupt {kind} {raw:?} in database: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_round_trip_in_utc() {
        let at = Utc
            .with_ymd_and_hms(2026, 10, 19, 8, 30, 0)
            .single()
            .expect("valid");
        let encoded = encode_time(at);
        assert_eq!(encoded, "2026-10-19T08:30:00.000000Z");
        assert_eq!(decode_time(&encoded).expect("decodes"), at);
    }

    #[test]
    fn corrupt_values_surface_as_unavailable() {
        assert!(matches!(
            decode_decimal("twelve"),
            Err(RepositoryError::Unavailable(_))
        ));
        assert!(matches!(
            decode_count(-1),
            Err(RepositoryError::Unavailable(_))
        ));
    }
}
