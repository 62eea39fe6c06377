// ============================
// authgate-backend/src/auth/token.rs
// ============================
//! Self-issued token minting.
//!
//! Tokens are HS256 JWTs signed with the shared secret the
//! [`SelfIssuedVerifier`](super::SelfIssuedVerifier) checks against. The
//! lifetime is a deployment-wide policy: issuer and verifier must be
//! configured from the same settings.
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use metrics::counter;
use thiserror::Error;
use uuid::Uuid;

use super::TokenClaims;
use crate::metrics::TOKEN_ISSUED;

/// Algorithm family shared by issuer and verifier
pub const TOKEN_ALGORITHM: Algorithm = Algorithm::HS256;

/// Default token lifetime (7 days)
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(60 * 60 * 24 * 7);

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("signing secret must not be empty")]
    EmptySecret,

    #[error("token lifetime out of range")]
    TtlOutOfRange,

    #[error("failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// A signed bearer token. Redacted in `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedToken(String);

impl SignedToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SignedToken([REDACTED])")
    }
}

/// Mints self-issued tokens
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
    ttl: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptySecret);
        }
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| TokenError::TtlOutOfRange)?;
        Ok(Self {
            key: EncodingKey::from_secret(secret),
            ttl,
        })
    }

    /// Issue a token for `subject` valid from now
    pub fn issue(&self, subject: Uuid, email: &str) -> Result<SignedToken, TokenError> {
        self.issue_at(subject, email, Utc::now())
    }

    /// Issue a token with an explicit issued-at instant
    pub fn issue_at(
        &self,
        subject: Uuid,
        email: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<SignedToken, TokenError> {
        let claims = TokenClaims {
            sub: subject.to_string(),
            email: email.to_string(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };
        let token = encode(&Header::new(TOKEN_ALGORITHM), &claims, &self.key)?;
        counter!(TOKEN_ISSUED).increment(1);
        Ok(SignedToken(token))
    }

    pub fn ttl(&self) -> chrono::Duration {
        self.ttl
    }
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};

    const SECRET: &[u8] = b"test-secret-key-that-is-long-enough";

    fn payload(token: &SignedToken) -> serde_json::Value {
        let part = token.as_str().split('.').nth(1).unwrap();
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(part).unwrap()).unwrap()
    }

    #[test]
    fn test_issue_embeds_claims() {
        let issuer = TokenIssuer::new(SECRET, DEFAULT_TOKEN_TTL).unwrap();
        let subject = Uuid::new_v4();
        let now = Utc::now();
        let token = issuer.issue_at(subject, "a@x.com", now).unwrap();

        let claims = payload(&token);
        assert_eq!(claims["sub"], subject.to_string());
        assert_eq!(claims["email"], "a@x.com");
        assert_eq!(claims["iat"], now.timestamp());
        assert_eq!(claims["exp"], now.timestamp() + 7 * 24 * 60 * 60);
    }

    #[test]
    fn test_issue_is_deterministic_per_instant() {
        let issuer = TokenIssuer::new(SECRET, DEFAULT_TOKEN_TTL).unwrap();
        let subject = Uuid::new_v4();
        let now = Utc::now();
        let a = issuer.issue_at(subject, "a@x.com", now).unwrap();
        let b = issuer.issue_at(subject, "a@x.com", now).unwrap();
        assert_eq!(a, b);
        let later = issuer
            .issue_at(subject, "a@x.com", now + chrono::Duration::seconds(1))
            .unwrap();
        assert_ne!(a, later);
    }

    #[test]
    fn test_header_uses_hs256() {
        let issuer = TokenIssuer::new(SECRET, Duration::from_secs(60)).unwrap();
        let token = issuer.issue(Uuid::new_v4(), "a@x.com").unwrap();
        let header = jsonwebtoken::decode_header(token.as_str()).unwrap();
        assert_eq!(header.alg, Algorithm::HS256);
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(matches!(
            TokenIssuer::new(b"", DEFAULT_TOKEN_TTL),
            Err(TokenError::EmptySecret)
        ));
    }

    #[test]
    fn test_debug_hides_token() {
        let issuer = TokenIssuer::new(SECRET, DEFAULT_TOKEN_TTL).unwrap();
        let token = issuer.issue(Uuid::new_v4(), "a@x.com").unwrap();
        assert_eq!(format!("{token:?}"), "SignedToken([REDACTED])");
    }
}
