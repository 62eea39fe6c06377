// ============================
// authgate-backend/src/reconcile.rs
// ============================
//! Identity reconciliation: verified claim in, exactly one profile out.
use std::sync::Arc;

use chrono::Utc;
use metrics::counter;
use tracing::{debug, info};

use crate::auth::IdentityClaim;
use crate::error::{AppError, StoreError};
use crate::metrics::PROFILE_CREATED;
use crate::storage::{ProfilePatch, ProfileStore, UserProfile};
use crate::validation::{normalize_email, validate_profile_images};

/// Fetch-or-create of profiles keyed by subject id
#[derive(Clone)]
pub struct IdentityReconciler {
    store: Arc<dyn ProfileStore>,
}

impl IdentityReconciler {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    /// Return the profile for `claim.subject_id`, creating it on first use.
    ///
    /// An existing profile is returned as stored, even if the claim's email
    /// has since changed. Racing first-time calls for the same subject all
    /// resolve to the single record that won the insert.
    pub async fn reconcile(&self, claim: &IdentityClaim) -> Result<UserProfile, StoreError> {
        if let Some(existing) = self.store.get_by_id(&claim.subject_id).await? {
            debug!(subject = %claim.subject_id, "profile found");
            return Ok(existing);
        }

        let candidate = UserProfile::new(
            claim.subject_id.clone(),
            normalize_email(&claim.email),
            Utc::now(),
        );
        let profile = self.store.create_if_absent(candidate.clone()).await?;
        if profile == candidate {
            info!(subject = %profile.id, "profile created on first verification");
            counter!(PROFILE_CREATED, "source" => "reconcile").increment(1);
        }
        Ok(profile)
    }

    /// Fetch an existing profile; `NotFound` if it was never reconciled
    pub async fn profile(&self, id: &str) -> Result<UserProfile, AppError> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Owner-scoped update of the image list; `None` only refreshes `updated_at`
    pub async fn update_profile(
        &self,
        id: &str,
        profile_images: Option<Vec<String>>,
    ) -> Result<UserProfile, AppError> {
        if let Some(images) = &profile_images {
            validate_profile_images(images)?;
        }
        let patch = ProfilePatch {
            profile_images,
            updated_at: Utc::now(),
        };
        Ok(self.store.update(id, patch).await?)
    }
}
