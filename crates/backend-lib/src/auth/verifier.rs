// ============================
// authgate-backend/src/auth/verifier.rs
// ============================
//! Credential verification strategies.
//!
//! Both strategies turn an opaque bearer string into an [`IdentityClaim`] or
//! a bare [`VerificationError::Invalid`]. The concrete failure reason is
//! logged here and nowhere else.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use metrics::counter;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{IdTokenProvider, IdentityClaim, IdentityProvider, TokenClaims, TOKEN_ALGORITHM};
use crate::config::{ConfigError, CredentialStrategy, Settings};
use crate::error::VerificationError;
use crate::metrics::{VERIFY_ACCEPTED, VERIFY_REJECTED};

/// Turns a bearer credential into an identity claim
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<IdentityClaim, VerificationError>;

    /// Strategy this verifier implements
    fn strategy(&self) -> CredentialStrategy;
}

fn reject(strategy: &'static str, reason: &str) -> VerificationError {
    warn!(strategy, reason, "credential rejected");
    counter!(VERIFY_REJECTED, "strategy" => strategy).increment(1);
    VerificationError::Invalid
}

fn accept(strategy: &'static str, claim: IdentityClaim) -> IdentityClaim {
    debug!(strategy, subject = %claim.subject_id, "credential accepted");
    counter!(VERIFY_ACCEPTED, "strategy" => strategy).increment(1);
    claim
}

/// Verifies HS256 tokens minted by [`TokenIssuer`](super::TokenIssuer)
#[derive(Clone)]
pub struct SelfIssuedVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl SelfIssuedVerifier {
    pub fn new(secret: &[u8]) -> Self {
        // only the issuer's algorithm is accepted; anything else in the header fails
        let mut validation = Validation::new(TOKEN_ALGORITHM);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Decode and check signature, algorithm and expiry
    pub fn decode(&self, token: &str) -> Result<TokenClaims, VerificationError> {
        let data = decode::<TokenClaims>(token, &self.key, &self.validation)
            .map_err(|e| reject("self_issued", &e.to_string()))?;
        let claims = data.claims;

        if Uuid::parse_str(&claims.sub).is_err() {
            return Err(reject("self_issued", "subject is not a UUID"));
        }
        if claims.email.trim().is_empty() {
            return Err(reject("self_issued", "email claim is empty"));
        }
        Ok(claims)
    }
}

#[async_trait]
impl CredentialVerifier for SelfIssuedVerifier {
    async fn verify(&self, token: &str) -> Result<IdentityClaim, VerificationError> {
        let claims = self.decode(token)?;
        Ok(accept("self_issued", claims.into()))
    }

    fn strategy(&self) -> CredentialStrategy {
        CredentialStrategy::SelfIssued
    }
}

/// Delegates verification to an external identity provider
#[derive(Clone)]
pub struct ProviderVerifier {
    provider: Arc<dyn IdentityProvider>,
    timeout: Duration,
}

impl ProviderVerifier {
    pub fn new(provider: Arc<dyn IdentityProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }
}

#[async_trait]
impl CredentialVerifier for ProviderVerifier {
    async fn verify(&self, token: &str) -> Result<IdentityClaim, VerificationError> {
        let claims = match tokio::time::timeout(self.timeout, self.provider.verify_id_token(token)).await {
            Ok(Ok(claims)) => claims,
            Ok(Err(e)) => return Err(reject("provider", &e.to_string())),
            Err(_) => return Err(reject("provider", "provider deadline exceeded")),
        };

        if claims.subject.is_empty() {
            return Err(reject("provider", "subject claim is empty"));
        }
        let email = match claims.email {
            Some(email) if !email.trim().is_empty() => email,
            _ => return Err(reject("provider", "email claim is missing")),
        };

        Ok(accept(
            "provider",
            IdentityClaim {
                subject_id: claims.subject,
                email,
            },
        ))
    }

    fn strategy(&self) -> CredentialStrategy {
        CredentialStrategy::Provider
    }
}

/// Build the verifier selected by `settings.strategy`
pub fn build_verifier(settings: &Settings) -> Result<Arc<dyn CredentialVerifier>, ConfigError> {
    match settings.strategy {
        CredentialStrategy::SelfIssued => {
            Ok(Arc::new(SelfIssuedVerifier::new(settings.token.secret.expose())))
        },
        CredentialStrategy::Provider => {
            let provider = IdTokenProvider::from_settings(&settings.provider)?;
            Ok(Arc::new(ProviderVerifier::new(
                Arc::new(provider),
                settings.provider_timeout(),
            )))
        },
    }
}
