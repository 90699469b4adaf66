//! Authentication system for metabee
//!
//! This module provides authentication functionality:
//! - Password hashing and verification (`password`)
//! - Signed, time-bounded session tokens (`session`)
//! - The per-request gate in front of protected routes (`gate`)
//! - Registration, login and password resets (`manager`)

pub mod gate;
pub mod manager;
pub mod password;
pub mod session;

pub use gate::{extract_bearer, AuthGate};
pub use manager::AuthManager;
pub use password::CredentialVerifier;
pub use session::{
    Clock, SessionAuthority, SessionClaims, SigningSecret, SystemClock, DEFAULT_TOKEN_TTL,
    MAX_TOKEN_TTL,
};
