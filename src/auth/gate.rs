//! Per-request authentication gate
//!
//! The gate turns an `Authorization` header into a live account, or into a
//! single `AuthError::Unauthenticated`. Why a request was turned away
//! (missing header, bad token, vanished account, slow store) is logged but
//! never reported to the client.

use std::sync::Arc;
use std::time::Duration;

use crate::database::AccountStore;
use crate::error::{AuthError, TokenError};
use crate::models::Account;

use super::session::SessionAuthority;

const BEARER_SCHEME: &str = "Bearer";

/// Extract the token from an `Authorization: Bearer <token>` header value
///
/// The scheme is matched case-insensitively; anything else (other schemes,
/// no separator, an empty token) yields `None`.
pub fn extract_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;

    if !scheme.eq_ignore_ascii_case(BEARER_SCHEME) {
        return None;
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }

    Some(token)
}

/// Internal reason for turning a request away
#[derive(Debug, Clone, PartialEq)]
enum Rejection {
    MissingCredentials,
    Token(TokenError),
    AccountNotFound,
    LookupTimeout,
    LookupFailed(String),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::MissingCredentials => f.write_str("missing or malformed bearer credentials"),
            Rejection::Token(e) => write!(f, "token rejected: {}", e),
            Rejection::AccountNotFound => f.write_str("token subject has no account"),
            Rejection::LookupTimeout => f.write_str("account lookup timed out"),
            Rejection::LookupFailed(e) => write!(f, "account lookup failed: {}", e),
        }
    }
}

/// Authentication gate for protected routes
pub struct AuthGate<S: AccountStore> {
    authority: Arc<SessionAuthority>,
    store: Arc<S>,
    lookup_timeout: Duration,
}

impl<S: AccountStore> AuthGate<S> {
    pub fn new(authority: Arc<SessionAuthority>, store: Arc<S>, lookup_timeout: Duration) -> Self {
        Self {
            authority,
            store,
            lookup_timeout,
        }
    }

    /// Authenticate a request from its `Authorization` header value
    ///
    /// Returns the account the token names, re-read from the store so that
    /// tokens for deleted accounts stop working immediately.
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<Account, AuthError> {
        match self.resolve(authorization).await {
            Ok(account) => {
                tracing::debug!(account_id = %account.id, "Request authenticated");
                Ok(account)
            }
            Err(rejection @ (Rejection::LookupTimeout | Rejection::LookupFailed(_))) => {
                tracing::warn!(reason = %rejection, "Authentication failed");
                Err(AuthError::Unauthenticated)
            }
            Err(rejection) => {
                tracing::debug!(reason = %rejection, "Authentication failed");
                Err(AuthError::Unauthenticated)
            }
        }
    }

    async fn resolve(&self, authorization: Option<&str>) -> Result<Account, Rejection> {
        let token = authorization
            .and_then(extract_bearer)
            .ok_or(Rejection::MissingCredentials)?;

        let account_id = self.authority.validate(token).map_err(Rejection::Token)?;

        let lookup = tokio::time::timeout(self.lookup_timeout, self.store.find_by_id(&account_id))
            .await
            .map_err(|_| Rejection::LookupTimeout)?;

        match lookup {
            Ok(Some(account)) => Ok(account),
            Ok(None) => Err(Rejection::AccountNotFound),
            Err(e) => Err(Rejection::LookupFailed(e.to_string())),
        }
    }
}
