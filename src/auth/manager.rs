//! Authentication manager
//!
//! This module provides the main authentication interface for the application.
//! It handles registration, login, operator password resets and request
//! authentication on top of the credential verifier, the session authority and
//! the account store.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};

use crate::config::AuthConfig;
use crate::database::AccountStore;
use crate::error::{AppError, AuthError, DbError};
use crate::models::{normalize_email, Account, LoginRequest, RegisterRequest, SessionGrant};

use super::gate::AuthGate;
use super::password::CredentialVerifier;
use super::session::SessionAuthority;

/// Authentication manager
///
/// Cheap to share behind an `Arc`; holds no mutable state.
pub struct AuthManager<S: AccountStore> {
    store: Arc<S>,
    verifier: CredentialVerifier,
    authority: Arc<SessionAuthority>,
    gate: AuthGate<S>,
    lookup_timeout: Duration,
}

impl<S: AccountStore + 'static> AuthManager<S> {
    /// Create a new authentication manager
    pub fn new(
        store: Arc<S>,
        verifier: CredentialVerifier,
        authority: Arc<SessionAuthority>,
        lookup_timeout: Duration,
    ) -> Self {
        let gate = AuthGate::new(authority.clone(), store.clone(), lookup_timeout);
        Self {
            store,
            verifier,
            authority,
            gate,
            lookup_timeout,
        }
    }

    /// Build a manager from the `auth` configuration section
    pub fn from_config(store: Arc<S>, config: &AuthConfig) -> Result<Self, AppError> {
        let verifier = CredentialVerifier::new(&config.password_hash)?;
        let authority = SessionAuthority::new(&config.jwt_secret, config.token_ttl())?;

        Ok(Self::new(
            store,
            verifier,
            Arc::new(authority),
            config.lookup_timeout(),
        ))
    }

    /// The account store behind this manager
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The session authority used to issue tokens
    pub fn authority(&self) -> &Arc<SessionAuthority> {
        &self.authority
    }

    /// Upper bound on any single account store call
    pub fn lookup_timeout(&self) -> Duration {
        self.lookup_timeout
    }

    /// Register a new account and issue its first session token
    pub async fn register(&self, request: RegisterRequest) -> Result<SessionGrant, AuthError> {
        let name = request.name.trim().to_string();
        let email = normalize_email(&request.email);

        if name.is_empty() || email.is_empty() || request.password.is_empty() {
            return Err(AuthError::InvalidInput(
                "name, email and password are required".to_string(),
            ));
        }
        if !is_plausible_email(&email) {
            return Err(AuthError::InvalidInput("email is not valid".to_string()));
        }

        if self.find_by_email(&email).await?.is_some() {
            tracing::info!(email = %email, "Registration rejected: account exists");
            return Err(AuthError::DuplicateAccount);
        }

        let password_hash = self.hash_password(request.password).await?;
        let account = Account::new(generate_account_id(), name, &email, password_hash);

        self.store.create_account(&account).await.map_err(|e| {
            let err = AuthError::from(e);
            if err != AuthError::DuplicateAccount {
                tracing::error!(email = %email, error = %err, "Failed to create account");
            }
            err
        })?;

        tracing::info!(account_id = %account.id, "Account registered");
        self.grant_for(&account.id)
    }

    /// Verify credentials and issue a session token
    ///
    /// An unknown email and a wrong password both yield `Unauthenticated`.
    pub async fn login(&self, request: LoginRequest) -> Result<SessionGrant, AuthError> {
        let email = normalize_email(&request.email);

        if email.is_empty() || request.password.is_empty() {
            return Err(AuthError::InvalidInput(
                "email and password are required".to_string(),
            ));
        }

        let account = match self.find_by_email(&email).await? {
            Some(account) => account,
            None => {
                self.verify_decoy(request.password).await?;
                tracing::debug!("Login failed: unknown email");
                return Err(AuthError::Unauthenticated);
            }
        };

        if !self
            .verify_password(request.password, account.password_hash.clone())
            .await?
        {
            tracing::debug!(account_id = %account.id, "Login failed: wrong password");
            return Err(AuthError::Unauthenticated);
        }

        tracing::info!(account_id = %account.id, "Login succeeded");
        self.grant_for(&account.id)
    }

    /// Authenticate a request by its `Authorization` header value
    pub async fn authenticate(&self, authorization: Option<&str>) -> Result<Account, AuthError> {
        self.gate.authenticate(authorization).await
    }

    /// Replace the password of the account with this email
    pub async fn reset_password(&self, email: &str, new_password: &str) -> Result<(), AuthError> {
        let email = normalize_email(email);

        if email.is_empty() || new_password.is_empty() {
            return Err(AuthError::InvalidInput(
                "email and password are required".to_string(),
            ));
        }

        let password_hash = self.hash_password(new_password.to_string()).await?;

        self.store
            .update_password_hash(&email, &password_hash)
            .await
            .map_err(|e| match e {
                DbError::NotFound => {
                    AuthError::InvalidInput(format!("no account for {}", email))
                }
                other => AuthError::from(other),
            })?;

        tracing::info!(email = %email, "Password reset");
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthError> {
        tokio::time::timeout(self.lookup_timeout, self.store.find_by_email(email))
            .await
            .map_err(|_| {
                tracing::warn!("Account lookup by email timed out");
                AuthError::Timeout
            })?
            .map_err(AuthError::from)
    }

    async fn hash_password(&self, password: String) -> Result<String, AuthError> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || verifier.hash(&password))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))?
    }

    async fn verify_password(&self, password: String, hash: String) -> Result<bool, AuthError> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || verifier.verify(&password, &hash))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    async fn verify_decoy(&self, password: String) -> Result<(), AuthError> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || verifier.verify_decoy(&password))
            .await
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

        fn grant_for(&self, account_id: &str) -> Result<SessionGrant, AuthError> {
        let token = self.authority.issue(account_id)?;
        Ok(SessionGrant::bearer(token, self.authority.ttl().as_secs()))
    }
}

/// Generate a new opaque account ID
fn generate_account_id() -> String {
    let mut id_bytes = [0u8; 16];
    OsRng.fill_bytes(&mut id_bytes);
    URL_SAFE_NO_PAD.encode(id_bytes)
}

fn is_plausible_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !email.contains(char::is_whitespace)
        }
        None => false,
    }
}
