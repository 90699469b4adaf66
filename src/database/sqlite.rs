//! SQLite implementation of the AccountStore trait
//!
//! This module provides a SQLite-based implementation of the AccountStore trait
//! using rusqlite and tokio-rusqlite for async operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{ErrorCode, OptionalExtension, Row};
use tokio_rusqlite::Connection;

use super::migrations::CREATE_SCHEMA;
use super::AccountStore;
use crate::error::DbError;
use crate::models::{normalize_email, Account, ProfileUpdate};

const ACCOUNT_COLUMNS: &str =
    "id, email, name, password_hash, bio, location, created_at, updated_at";

/// SQLite database implementation
pub struct SqliteDatabase {
    conn: Connection,
}

impl SqliteDatabase {
    /// Create a new SQLite database connection
    ///
    /// Use `:memory:` for in-memory database or a file path for persistent storage.
    pub async fn new(path: &str) -> Result<Self, DbError> {
        let conn = Connection::open(path).await?;

        // Run migrations
        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Create a new in-memory database (useful for testing)
    pub async fn in_memory() -> Result<Self, DbError> {
        Self::new(":memory:").await
    }

    async fn find_one(&self, column: &'static str, value: String) -> Result<Option<Account>, DbError> {
        self.conn
            .call(move |conn| {
                let sql = format!(
                    "SELECT {} FROM accounts WHERE {} = ?1",
                    ACCOUNT_COLUMNS, column
                );
                Ok(conn.query_row(&sql, [&value], row_to_account).optional()?)
            })
            .await
            .map_err(Into::into)
    }
}

#[async_trait]
impl AccountStore for SqliteDatabase {
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, DbError> {
        self.find_one("id", id.to_string()).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DbError> {
        self.find_one("email", normalize_email(email)).await
    }

    async fn create_account(&self, account: &Account) -> Result<(), DbError> {
        let id = account.id.clone();
        let email = normalize_email(&account.email);
        let name = account.name.clone();
        let password_hash = account.password_hash.clone();
        let bio = account.bio.clone();
        let location = account.location.clone();
        let created_at = account.created_at.to_rfc3339();

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO accounts
                    (id, email, name, password_hash, bio, location, created_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    rusqlite::params![id, email, name, password_hash, bio, location, created_at],
                )?;
                Ok(())
            })
            .await
            .map_err(map_write_error)
    }

    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<Account, DbError> {
        let id = id.to_string();
        let name = update.name.clone();
        let bio = update.bio.clone();
        let location = update.location.clone();
        let updated_at = Utc::now().to_rfc3339();

        let account = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"
                    UPDATE accounts
                    SET name = COALESCE(?2, name),
                        bio = COALESCE(?3, bio),
                        location = COALESCE(?4, location),
                        updated_at = ?5
                    WHERE id = ?1
                    "#,
                    rusqlite::params![id, name, bio, location, updated_at],
                )?;

                if changed == 0 {
                    return Ok(None);
                }

                let sql = format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS);
                Ok(conn.query_row(&sql, [&id], row_to_account).optional()?)
            })
            .await
            .map_err(map_write_error)?;

        account.ok_or(DbError::NotFound)
    }

    async fn update_password_hash(&self, email: &str, password_hash: &str) -> Result<(), DbError> {
        let email = normalize_email(email);
        let password_hash = password_hash.to_string();
        let updated_at = Utc::now().to_rfc3339();

        let changed = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "UPDATE accounts SET password_hash = ?2, updated_at = ?3 WHERE email = ?1",
                    rusqlite::params![email, password_hash, updated_at],
                )?)
            })
            .await
            .map_err(map_write_error)?;

        if changed == 0 {
            return Err(DbError::NotFound);
        }

        Ok(())
    }
}

fn row_to_account(row: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        password_hash: row.get(3)?,
        bio: row.get(4)?,
        location: row.get(5)?,
        created_at: parse_datetime(row.get::<_, Option<String>>(6)?).unwrap_or_else(Utc::now),
        updated_at: parse_datetime(row.get::<_, Option<String>>(7)?),
    })
}

/// Map unique-key failures to `DbError::ConstraintViolation`
fn map_write_error(err: tokio_rusqlite::Error) -> DbError {
    match err {
        tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, msg))
            if e.code == ErrorCode::ConstraintViolation =>
        {
            DbError::ConstraintViolation(msg.unwrap_or_else(|| e.to_string()))
        }
        other => other.into(),
    }
}

/// Parse a datetime string to DateTime<Utc>
fn parse_datetime(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                // SQLite's CURRENT_TIMESTAMP format
                chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|dt| dt.and_utc())
            })
    })
}
