//! Domain models for metabee
//!
//! This module contains the core domain models used throughout the application.

pub mod account;

// Re-export commonly used types
pub use account::{
    normalize_email, Account, Identity, LoginRequest, Profile, ProfileUpdate, RegisterRequest,
    SessionGrant,
};
