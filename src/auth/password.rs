//! Credential hashing and verification
//!
//! Passwords are hashed with Argon2id. Every hash gets a fresh random salt and
//! is stored as a PHC string, so verification reads the salt and cost
//! parameters back out of the stored value rather than from configuration.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use std::sync::Arc;

use crate::config::PasswordHashConfig;
use crate::error::AuthError;

const DECOY_SECRET: &str = "metabee-decoy-credential";

/// One-way password hasher and verifier
#[derive(Clone)]
pub struct CredentialVerifier {
    argon2: Argon2<'static>,
    decoy_hash: Arc<str>,
}

impl CredentialVerifier {
    /// Build a verifier with the configured Argon2id cost parameters
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Hashing` if the parameters are outside the ranges
    /// Argon2 accepts.
    pub fn new(config: &PasswordHashConfig) -> Result<Self, AuthError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| AuthError::Hashing(e.to_string()))?;

        let mut verifier = Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            decoy_hash: Arc::from(""),
        };
        verifier.decoy_hash = Arc::from(verifier.hash(DECOY_SECRET)?);

        Ok(verifier)
    }

    /// Hash a secret with a freshly generated salt
    ///
    /// Two calls with the same input produce different strings.
    ///
    /// # Example
    ///
    /// ```
    /// use metabee::auth::CredentialVerifier;
    /// use metabee::config::PasswordHashConfig;
    ///
    /// let verifier = CredentialVerifier::new(&PasswordHashConfig::default()).unwrap();
    /// let hash = verifier.hash("correct horse").unwrap();
    /// assert!(hash.starts_with("$argon2id$"));
    /// assert!(verifier.verify("correct horse", &hash));
    /// ```
    pub fn hash(&self, secret: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);

        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hashing(e.to_string()))
    }

    /// Check a secret against a stored hash
    ///
    /// Empty, unparseable and mismatching hashes all yield `false`.
    pub fn verify(&self, secret: &str, hash: &str) -> bool {
        if hash.is_empty() {
            return false;
        }

        let parsed_hash = match PasswordHash::new(hash) {
            Ok(h) => h,
            Err(_) => return false,
        };

        self.argon2
            .verify_password(secret.as_bytes(), &parsed_hash)
            .is_ok()
    }

    /// Run a full verification against a hash no account owns
    ///
    /// Logins for unknown emails call this so they cost the same as a wrong
    /// password.
    pub fn verify_decoy(&self, secret: &str) {
        let _ = self.verify(secret, &self.decoy_hash);
    }
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}
