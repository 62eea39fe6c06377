// ============================
// authgate-backend/src/auth/password.rs
// ============================
//! Password hashing and verification.
//!
//! Hashes are scrypt PHC strings; the salt and the cost parameters travel
//! inside the string, so verification always uses the cost the hash was
//! created with.
use std::fmt;

use password_hash::{
    rand_core::OsRng, PasswordHash as PhcHash, PasswordHasher, PasswordVerifier, SaltString,
};
use scrypt::{Params, Scrypt};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

/// Minimum password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length accepted for hashing
pub const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("invalid scrypt parameters")]
    Params,

    #[error("password hashing failed")]
    Hashing,
}

/// A stored one-way password hash. Never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Wrap a PHC string loaded from storage
    pub fn from_phc(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PasswordHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PasswordHash([REDACTED])")
    }
}

/// Password complexity requirements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordRequirements {
    pub min_length: usize,
    pub max_length: usize,
    pub require_uppercase: bool,
    pub require_lowercase: bool,
    pub require_digit: bool,
    pub require_special: bool,
}

impl Default for PasswordRequirements {
    fn default() -> Self {
        Self {
            min_length: MIN_PASSWORD_LENGTH,
            max_length: MAX_PASSWORD_LENGTH,
            require_uppercase: false,
            require_lowercase: false,
            require_digit: false,
            require_special: false,
        }
    }
}

/// Salted, adaptive-cost password hashing
#[derive(Clone, Copy, Debug)]
pub struct PasswordAuthenticator {
    params: Params,
}

impl Default for PasswordAuthenticator {
    fn default() -> Self {
        Self {
            params: Params::recommended(),
        }
    }
}

impl PasswordAuthenticator {
    /// Authenticator with a custom cost (`log_n` is the log2 of the scrypt N parameter)
    pub fn with_cost(log_n: u8) -> Result<Self, PasswordError> {
        let params = Params::new(log_n, Params::RECOMMENDED_R, Params::RECOMMENDED_P, Params::RECOMMENDED_LEN)
            .map_err(|_| PasswordError::Params)?;
        Ok(Self { params })
    }

    /// Hash a password with a fresh random salt
    pub fn hash(&self, plain: &str) -> Result<PasswordHash, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Scrypt
            .hash_password_customized(plain.as_bytes(), None, None, self.params, &salt)
            .map_err(|_| PasswordError::Hashing)?
            .to_string();
        Ok(PasswordHash(hash))
    }

    /// Hash a password and wipe the plaintext
    pub fn hash_secure(&self, plain: &mut String) -> Result<PasswordHash, PasswordError> {
        let hash = self.hash(plain);
        plain.zeroize();
        hash
    }

    /// Verify a password against a hash. A malformed hash never matches.
    pub fn verify(&self, plain: &str, hash: &PasswordHash) -> bool {
        let Ok(parsed) = PhcHash::new(hash.as_str()) else {
            return false;
        };
        Scrypt.verify_password(plain.as_bytes(), &parsed).is_ok()
    }
}

/// Hash a password using the recommended scrypt cost
pub fn hash_password(plain: &str) -> Result<PasswordHash, PasswordError> {
    PasswordAuthenticator::default().hash(plain)
}

/// Verify a password against a hash
pub fn verify_password(plain: &str, hash: &PasswordHash) -> bool {
    PasswordAuthenticator::default().verify(plain, hash)
}

/// Check if a password meets the complexity requirements
pub fn validate_password_strength(password: &str, requirements: &PasswordRequirements) -> bool {
    let len = password.chars().count();
    if len < requirements.min_length || len > requirements.max_length {
        return false;
    }

    if requirements.require_uppercase && !password.chars().any(char::is_uppercase) {
        return false;
    }

    if requirements.require_lowercase && !password.chars().any(char::is_lowercase) {
        return false;
    }

    if requirements.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }

    if requirements.require_special && !password.chars().any(|c| !c.is_alphanumeric()) {
        return false;
    }

    true
}
