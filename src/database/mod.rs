//! Account persistence for metabee
//!
//! This module defines the account store trait and its SQLite implementation.

pub mod migrations;
pub mod sqlite;

pub use sqlite::SqliteDatabase;

use async_trait::async_trait;

use crate::error::DbError;
use crate::models::{Account, ProfileUpdate};

/// Account store used by the authentication layer and the profile endpoints
///
/// Lookups return `Ok(None)` when no account matches; `Err` is reserved for
/// storage failures.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find an account by its ID
    async fn find_by_id(&self, id: &str) -> Result<Option<Account>, DbError>;

    /// Find an account by email, ignoring case
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, DbError>;

    /// Insert a new account
    ///
    /// Fails with `DbError::ConstraintViolation` when the email is taken.
    async fn create_account(&self, account: &Account) -> Result<(), DbError>;

    /// Apply the non-empty fields of `update` and return the stored account
    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<Account, DbError>;

    /// Replace the password hash of the account with this email
    async fn update_password_hash(&self, email: &str, password_hash: &str) -> Result<(), DbError>;
}
