// ============================
// authgate-backend/src/auth/password_login.rs
// ============================
//! Password registration and login for the self-issued strategy.
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::{info, warn};
use uuid::Uuid;

use super::{PasswordAuthenticator, PasswordHash, PasswordRequirements, SignedToken, TokenIssuer};
use crate::error::AppError;
use crate::metrics::{LOGIN_FAILED, PROFILE_CREATED};
use crate::storage::{ProfileStore, UserProfile};
use crate::validation::{normalize_email, validate_email, validate_password};

/// Register/login flow: hash or check the password, persist, mint a token
#[derive(Clone)]
pub struct PasswordLogin {
    store: Arc<dyn ProfileStore>,
    issuer: TokenIssuer,
    authenticator: PasswordAuthenticator,
    requirements: PasswordRequirements,
    // compared against on unknown emails so both failure paths cost one hash
    decoy: PasswordHash,
}

impl PasswordLogin {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        issuer: TokenIssuer,
        authenticator: PasswordAuthenticator,
        requirements: PasswordRequirements,
    ) -> Result<Self, AppError> {
        let decoy = authenticator.hash(&Uuid::new_v4().to_string())?;
        Ok(Self {
            store,
            issuer,
            authenticator,
            requirements,
            decoy,
        })
    }

    /// Create a password profile and return a token for it.
    /// A taken email is a `Conflict`.
    pub async fn register(
        &self,
        email: &str,
        password: String,
    ) -> Result<(SignedToken, UserProfile), AppError> {
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(&password, &self.requirements)?;

        let authenticator = self.authenticator;
        let hash = tokio::task::spawn_blocking(move || {
            let mut password = password;
            authenticator.hash_secure(&mut password)
        })
        .await??;

        let subject = Uuid::new_v4();
        let profile = UserProfile::new(subject.to_string(), email, Utc::now()).with_password_hash(hash);
        let profile = self.store.create(profile).await?;
        counter!(PROFILE_CREATED, "source" => "register").increment(1);
        info!(subject = %profile.id, "profile registered");

        let token = self.issuer.issue(subject, &profile.email)?;
        Ok((token, profile))
    }

    /// Check credentials and return a fresh token.
    /// Unknown email and wrong password are the same `Unauthorized`.
    pub async fn login(
        &self,
        email: &str,
        password: String,
    ) -> Result<(SignedToken, UserProfile), AppError> {
        let email = normalize_email(email);
        let profile = self.store.get_by_email(&email).await?;

        let hash = profile
            .as_ref()
            .and_then(|p| p.password_hash.clone())
            .unwrap_or_else(|| self.decoy.clone());
        let authenticator = self.authenticator;
        let matched =
            tokio::task::spawn_blocking(move || authenticator.verify(&password, &hash)).await?;

        let profile = match profile {
            Some(profile) if matched && profile.password_hash.is_some() => profile,
            _ => {
                warn!("password login rejected");
                counter!(LOGIN_FAILED).increment(1);
                return Err(AppError::Unauthorized);
            },
        };

        let subject = Uuid::parse_str(&profile.id).map_err(|_| {
            warn!(subject = %profile.id, "password profile has a non-UUID id");
            AppError::Unauthorized
        })?;
        let token = self.issuer.issue(subject, &profile.email)?;
        Ok((token, profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialVerifier, SelfIssuedVerifier, DEFAULT_TOKEN_TTL};
    use crate::storage::MemoryProfileStore;
    use crate::validation::ValidationError;

    const SECRET: &[u8] = b"test-secret-key-that-is-long-enough";

    fn login_flow(store: MemoryProfileStore) -> PasswordLogin {
        PasswordLogin::new(
            Arc::new(store),
            TokenIssuer::new(SECRET, DEFAULT_TOKEN_TTL).unwrap(),
            PasswordAuthenticator::with_cost(8).unwrap(),
            PasswordRequirements::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let store = MemoryProfileStore::new();
        let flow = login_flow(store.clone());
        let verifier = SelfIssuedVerifier::new(SECRET);

        let (token, profile) = flow.register("a@x.com", "longenough1".into()).await.unwrap();
        assert_eq!(profile.email, "a@x.com");
        assert!(profile.password_hash.is_some());
        let claim = verifier.verify(token.as_str()).await.unwrap();
        assert_eq!(claim.email, "a@x.com");
        assert_eq!(claim.subject_id, profile.id);

        let (token, again) = flow.login("A@x.com ", "longenough1".into()).await.unwrap();
        assert_eq!(again.id, profile.id);
        assert_eq!(verifier.verify(token.as_str()).await.unwrap().subject_id, profile.id);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email() {
        let flow = login_flow(MemoryProfileStore::new());
        flow.register("a@x.com", "longenough1".into()).await.unwrap();

        assert!(matches!(
            flow.login("a@x.com", "longenough2".into()).await,
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            flow.login("nobody@x.com", "longenough1".into()).await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let flow = login_flow(MemoryProfileStore::new());
        flow.register("a@x.com", "longenough1".into()).await.unwrap();
        assert!(matches!(
            flow.register("A@X.COM", "different-pass".into()).await,
            Err(AppError::Conflict)
        ));
    }

    #[tokio::test]
    async fn test_register_validates_input() {
        let flow = login_flow(MemoryProfileStore::new());
        assert!(matches!(
            flow.register("not-an-email", "longenough1".into()).await,
            Err(AppError::Validation(ValidationError::InvalidEmail(_)))
        ));
        assert!(matches!(
            flow.register("a@x.com", "short".into()).await,
            Err(AppError::Validation(ValidationError::InvalidPassword(_)))
        ));
    }

    #[tokio::test]
    async fn test_provider_profile_cannot_password_login() {
        let store = MemoryProfileStore::new();
        store
            .insert(UserProfile::new("firebase-uid", "p@x.com", Utc::now()))
            .await
            .unwrap();
        let flow = login_flow(store);
        assert!(matches!(
            flow.login("p@x.com", "anything-at-all".into()).await,
            Err(AppError::Unauthorized)
        ));
    }
}
