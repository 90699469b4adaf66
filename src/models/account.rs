//! Account-related domain models
//!
//! Three families of types live here and are kept apart on purpose:
//! transport inputs (`RegisterRequest`, `LoginRequest`, `ProfileUpdate`),
//! the persisted `Account`, and the public-facing `Identity` / `Profile`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Account as stored by the account store
///
/// Deliberately not `Serialize`: the password hash must never reach a client.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    /// Opaque unique account ID
    pub id: String,

    /// Normalized email (trimmed, lowercase)
    pub email: String,

    /// Argon2id PHC string
    pub password_hash: String,

    /// Display name
    pub name: String,

    /// Short biography
    pub bio: Option<String>,

    /// Where the user lives
    pub location: Option<String>,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the profile was last changed
    pub updated_at: Option<DateTime<Utc>>,
}

impl Account {
    /// Create a new account
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl AsRef<str>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            email: normalize_email(email.as_ref()),
            password_hash: password_hash.into(),
            name: name.into(),
            bio: None,
            location: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Set the biography
    pub fn with_bio(mut self, bio: impl Into<String>) -> Self {
        self.bio = Some(bio.into());
        self
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"[REDACTED]")
            .field("name", &self.name)
            .field("bio", &self.bio)
            .field("location", &self.location)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Verified identity attached to authenticated requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Account ID
    pub id: String,

    /// Account email
    pub email: String,

    /// Display name
    pub name: String,
}

impl From<&Account> for Identity {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            email: account.email.clone(),
            name: account.name.clone(),
        }
    }
}

/// Public profile returned by the profile endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&Account> for Profile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id.clone(),
            name: account.name.clone(),
            email: account.email.clone(),
            bio: account.bio.clone(),
            location: account.location.clone(),
            created_at: account.created_at,
            updated_at: account.updated_at,
        }
    }
}

/// Registration body
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default, alias = "secret")]
    pub password: String,
}

impl RegisterRequest {
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Login body
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,

    #[serde(default, alias = "secret")]
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Profile update body; empty or missing fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub bio: Option<String>,

    #[serde(default)]
    pub location: Option<String>,
}

impl ProfileUpdate {
    /// Drop fields that are blank after trimming
    pub fn normalized(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            name: keep(self.name),
            bio: keep(self.bio),
            location: keep(self.location),
        }
    }

    /// True when there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.bio.is_none() && self.location.is_none()
    }
}

/// Token handed out after a successful login or registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionGrant {
    /// Signed bearer token
    pub token: String,

    /// Always "Bearer"
    pub token_type: String,

    /// Seconds until the token expires
    pub expires_in: u64,
}

impl SessionGrant {
    pub fn bearer(token: impl Into<String>, expires_in: u64) -> Self {
        Self {
            token: token.into(),
            token_type: "Bearer".to_string(),
            expires_in,
        }
    }
}

/// Canonical form of an email address used as the account key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
