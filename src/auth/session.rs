//! Session token issuance and validation
//!
//! Session tokens are HS256-signed JWTs carrying the account ID (`sub`), the
//! issue time (`iat`), the expiry (`exp`) and a random token ID (`jti`).
//! Nothing is stored server-side: a token is valid exactly when its signature
//! verifies under the current secret and the clock has not yet reached `exp`.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::TokenError;

/// Default validity window for session tokens (24 hours)
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Longest validity window an authority accepts (one year)
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// HMAC signing secret
///
/// Loaded once from configuration; `Debug` never prints the value.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SigningSecret(String);

impl SigningSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<&str> for SigningSecret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SigningSecret([REDACTED])")
    }
}

/// Claims carried by a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Account ID
    pub sub: String,

    /// Issued at (unix seconds)
    pub iat: i64,

    /// Expires at (unix seconds)
    pub exp: i64,

    /// Random token ID
    pub jti: String,
}

/// Issues and validates session tokens
pub struct SessionAuthority {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    ttl_secs: i64,
    clock: Arc<dyn Clock>,
}

impl SessionAuthority {
    /// Create an authority signing with `secret`
    ///
    /// # Errors
    ///
    /// Returns `TokenError::MissingSecret` if the secret is empty and
    /// `TokenError::InvalidLifetime` if `ttl` is zero or above `MAX_TOKEN_TTL`.
    pub fn new(secret: &SigningSecret, ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        if ttl.is_zero() || ttl > MAX_TOKEN_TTL {
            return Err(TokenError::InvalidLifetime);
        }
        let ttl_secs = i64::try_from(ttl.as_secs()).map_err(|_| TokenError::InvalidLifetime)?;

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock in `validate`.
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl,
            ttl_secs,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Token validity window
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `account_id`
    pub fn issue(&self, account_id: &str) -> Result<String, TokenError> {
        if account_id.trim().is_empty() {
            return Err(TokenError::InvalidSubject);
        }

        let now = self.clock.now().timestamp();
        let claims = SessionClaims {
            sub: account_id.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl_secs),
            jti: generate_token_id(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Validate a token and return its subject
    pub fn validate(&self, token: &str) -> Result<String, TokenError> {
        self.decode_claims(token).map(|claims| claims.sub)
    }

    /// Validate a token and return all of its claims
    pub fn decode_claims(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    TokenError::BadSignature
                }
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            })?;

        let claims = data.claims;

        if self.clock.now().timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        if claims.sub.is_empty() {
            return Err(TokenError::EmptySubject);
        }

        Ok(claims)
    }
}

impl std::fmt::Debug for SessionAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionAuthority")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

fn generate_token_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
