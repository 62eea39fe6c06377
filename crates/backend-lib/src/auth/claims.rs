// ============================
// authgate-backend/src/auth/claims.rs
// ============================
//! Identity claims.
use serde::{Deserialize, Serialize};

/// Canonical identity extracted from a verified credential,
/// whichever strategy verified it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaim {
    /// Stable subject identifier; the profile primary key
    pub subject_id: String,
    pub email: String,
}

/// Payload of a self-issued token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (profile id, a UUID)
    pub sub: String,
    pub email: String,
    /// Issued-at, seconds since the Unix epoch
    pub iat: i64,
    /// Expiry, seconds since the Unix epoch
    pub exp: i64,
}

impl From<TokenClaims> for IdentityClaim {
    fn from(claims: TokenClaims) -> Self {
        Self {
            subject_id: claims.sub,
            email: claims.email,
        }
    }
}
