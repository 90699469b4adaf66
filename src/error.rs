//! Application error types for metabee
//!
//! This module defines common error types used throughout the application.
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Authentication-related errors
///
/// `Unauthenticated` is the only variant a protected endpoint ever reports to
/// a client; the finer-grained reasons stay in the logs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AuthError {
    /// Empty or malformed credentials / registration input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An account with this email already exists
    #[error("Account already exists")]
    DuplicateAccount,

    /// Password hashing failed
    #[error("Hashing failed: {0}")]
    Hashing(String),

    /// Any token, credential or account lookup failure
    #[error("Unauthenticated")]
    Unauthenticated,

    /// The account store did not answer in time
    #[error("Account lookup timed out")]
    Timeout,

    /// The account store failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// A session token could not be issued
    #[error("Session error: {0}")]
    Session(#[from] TokenError),
}

/// Session token errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TokenError {
    /// Token could not be parsed into header, claims and signature
    #[error("Malformed token")]
    Malformed,

    /// Signature does not verify under the current secret
    #[error("Bad token signature")]
    BadSignature,

    /// Token is past its expiry
    #[error("Token expired")]
    Expired,

    /// Token carries an empty subject
    #[error("Token subject is empty")]
    EmptySubject,

    /// Attempted to issue a token for an empty account id
    #[error("Invalid token subject")]
    InvalidSubject,

    /// Signing secret is not configured
    #[error("Signing secret is not configured")]
    MissingSecret,

    /// Validity window is zero or longer than the supported maximum
    #[error("Token lifetime out of range")]
    InvalidLifetime,

    /// Encoding the token failed
    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DbError {
    /// SQLite error
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Record not found
    #[error("Record not found")]
    NotFound,

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Connection could not be used (poisoned lock, cancelled task)
    #[error("Connection error: {0}")]
    Connection(String),
}

/// Application-level error type
///
/// This is the main error type used throughout the application.
/// It aggregates all domain-specific error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Authentication error
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Token error
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
}

impl From<tokio_rusqlite::Error> for DbError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => DbError::Sqlite(e),
            other => DbError::Connection(other.to_string()),
        }
    }
}

impl From<DbError> for AuthError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConstraintViolation(_) => AuthError::DuplicateAccount,
            other => AuthError::Storage(other.to_string()),
        }
    }
}
