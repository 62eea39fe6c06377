// ============================
// authgate-backend/src/auth/provider.rs
// ============================
//! External identity provider collaborator.
//!
//! The gateway only consumes a small contract from a provider: give it an
//! opaque ID token, get back a subject and (usually) an email, or a failure.
//! [`IdTokenProvider`] is the built-in implementation for providers that
//! issue RS256-signed OpenID ID tokens with the project id as audience.
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::{ConfigError, ProviderSettings};

/// Provider-side failures. All of them become `VerificationError::Invalid`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("token rejected by provider: {0}")]
    Rejected(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),
}

/// Claim set returned by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderClaims {
    pub subject: String,
    pub email: Option<String>,
    /// Everything else the provider asserted
    pub extra: Map<String, Value>,
}

impl ProviderClaims {
    pub fn new(subject: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            subject: subject.into(),
            email: email.map(str::to_string),
            extra: Map::new(),
        }
    }
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify_id_token(&self, token: &str) -> Result<ProviderClaims, ProviderError>;
}

#[derive(Debug, Clone, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Verifies RS256 ID tokens against a configured public key
#[derive(Clone)]
pub struct IdTokenProvider {
    key: DecodingKey,
    validation: Validation,
}

impl IdTokenProvider {
    /// `audience` is the provider project id; `issuer` is checked when given.
    pub fn new(public_key_pem: &str, audience: &str, issuer: Option<&str>) -> Result<Self, ConfigError> {
        let key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())
            .map_err(|e| ConfigError::Invalid(format!("provider public key: {e}")))?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        validation.set_required_spec_claims(&["exp", "sub", "aud"]);
        Ok(Self { key, validation })
    }

    pub fn from_settings(settings: &ProviderSettings) -> Result<Self, ConfigError> {
        let pem = settings
            .public_key()?
            .ok_or_else(|| ConfigError::Invalid("provider public key is not configured".into()))?;
        let audience = settings
            .project_id
            .as_deref()
            .ok_or_else(|| ConfigError::Invalid("provider.project_id is not configured".into()))?;
        Self::new(&pem, audience, settings.issuer.as_deref())
    }
}

#[async_trait]
impl IdentityProvider for IdTokenProvider {
    async fn verify_id_token(&self, token: &str) -> Result<ProviderClaims, ProviderError> {
        let data = decode::<IdTokenClaims>(token, &self.key, &self.validation)
            .map_err(|e| ProviderError::Rejected(e.to_string()))?;
        let claims = data.claims;
        Ok(ProviderClaims {
            subject: claims.sub,
            email: claims.email,
            extra: claims.extra,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const PRIVATE: &str = include_str!("../../tests/fixtures/provider_private.pem");
    const OTHER_PRIVATE: &str = include_str!("../../tests/fixtures/other_private.pem");
    const PUBLIC: &str = include_str!("../../tests/fixtures/provider_public.pem");
    const ISSUER: &str = "https://securetoken.example.com/demo-project";

    fn sign(private: &str, claims: &Value) -> String {
        let key = EncodingKey::from_rsa_pem(private.as_bytes()).unwrap();
        encode(&Header::new(Algorithm::RS256), claims, &key).unwrap()
    }

    fn claims(aud: &str, email: Option<&str>) -> Value {
        let now = Utc::now().timestamp();
        let mut claims = json!({
            "sub": "uid-42",
            "aud": aud,
            "iss": ISSUER,
            "iat": now,
            "exp": now + 3600,
            "email_verified": true,
        });
        if let Some(email) = email {
            claims["email"] = json!(email);
        }
        claims
    }

    fn provider() -> IdTokenProvider {
        IdTokenProvider::new(PUBLIC, "demo-project", Some(ISSUER)).unwrap()
    }

    #[tokio::test]
    async fn test_valid_id_token() {
        let token = sign(PRIVATE, &claims("demo-project", Some("c@x.com")));
        let claims = provider().verify_id_token(&token).await.unwrap();
        assert_eq!(claims.subject, "uid-42");
        assert_eq!(claims.email.as_deref(), Some("c@x.com"));
        assert_eq!(claims.extra.get("email_verified"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_missing_email_is_passed_through() {
        let token = sign(PRIVATE, &claims("demo-project", None));
        let claims = provider().verify_id_token(&token).await.unwrap();
        assert!(claims.email.is_none());
    }

    #[tokio::test]
    async fn test_wrong_audience_rejected() {
        let token = sign(PRIVATE, &claims("someone-else", Some("c@x.com")));
        assert!(matches!(
            provider().verify_id_token(&token).await,
            Err(ProviderError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_signing_key_rejected() {
        let token = sign(OTHER_PRIVATE, &claims("demo-project", Some("c@x.com")));
        assert!(provider().verify_id_token(&token).await.is_err());
    }

    #[tokio::test]
    async fn test_hmac_token_rejected() {
        // an HS256 token signed with the public key bytes must not pass
        let key = EncodingKey::from_secret(PUBLIC.as_bytes());
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims("demo-project", Some("c@x.com")),
            &key,
        )
        .unwrap();
        assert!(provider().verify_id_token(&token).await.is_err());
    }

    #[test]
    fn test_invalid_public_key() {
        assert!(IdTokenProvider::new("not-a-pem", "demo-project", None).is_err());
    }
}
