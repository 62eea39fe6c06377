// ============================
// authgate-backend/src/lib.rs
// ============================
//! Core functionality of the authentication gateway: credential
//! verification, password login, token issuing and profile reconciliation.

pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod reconcile;
pub mod router;
pub mod storage;
pub mod validation;

use std::sync::Arc;

use tracing::info;

use crate::auth::{build_verifier, CredentialVerifier, PasswordAuthenticator, PasswordLogin, TokenIssuer};
use crate::config::{CredentialStrategy, Settings};
use crate::error::AppError;
use crate::reconcile::IdentityReconciler;
use crate::storage::{open_store, ProfileStore};

/// Application state shared across all handlers.
///
/// Every collaborator is constructed once at startup and injected here;
/// nothing is reached through a global.
#[derive(Clone)]
pub struct AppState {
    /// Settings the process was started with
    pub settings: Arc<Settings>,
    /// Strategy-specific credential verifier
    pub verifier: Arc<dyn CredentialVerifier>,
    /// Profile fetch-or-create
    pub reconciler: IdentityReconciler,
    /// Register/login flow, only under the self-issued strategy
    pub password_login: Option<PasswordLogin>,
}

impl AppState {
    /// Create the application state from explicit collaborators
    pub fn new(
        settings: Settings,
        store: Arc<dyn ProfileStore>,
        verifier: Arc<dyn CredentialVerifier>,
    ) -> Result<Self, AppError> {
        let password_login = match verifier.strategy() {
            CredentialStrategy::SelfIssued => {
                let issuer = TokenIssuer::new(settings.token.secret.expose(), settings.token_ttl())?;
                let authenticator = PasswordAuthenticator::with_cost(settings.password_hash_log_n)?;
                Some(PasswordLogin::new(
                    store.clone(),
                    issuer,
                    authenticator,
                    settings.password_requirements.clone(),
                )?)
            },
            CredentialStrategy::Provider => None,
        };

        Ok(Self {
            settings: Arc::new(settings),
            verifier,
            reconciler: IdentityReconciler::new(store),
            password_login,
        })
    }

    /// Create the application state from settings alone
    pub fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let store = open_store(&settings.store)?;
        let verifier = build_verifier(&settings)?;
        info!(strategy = ?settings.strategy, backend = ?settings.store.backend, "collaborators ready");
        Ok(Self::new(settings, store, verifier)?)
    }
}
