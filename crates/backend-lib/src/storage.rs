// ============================
// authgate-backend/src/storage.rs
// ============================
//! Profile storage abstraction with in-memory and flat-file implementations.
//!
//! Uniqueness of `id` and `email` is enforced by each backend's own insert
//! primitive; [`ProfileStore::create_if_absent`] is built on top of that
//! primitive and never does a separate exists-check before inserting.
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authgate_common::ProfileView;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use dashmap::{mapref::entry::Entry, DashMap};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::fs as tokio_fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::PasswordHash;
use crate::config::{StoreBackend, StoreSettings};
use crate::error::StoreError;
use crate::metrics::PROFILE_CREATE_CONFLICT;

/// How many insert attempts `create_if_absent` makes when the conflicting
/// record is not readable yet (or no longer) after a failed insert
pub const CREATE_IF_ABSENT_ATTEMPTS: u32 = 5;

const CREATE_RETRY_BACKOFF: Duration = Duration::from_millis(5);

/// One registered identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    /// Only present for password-registered profiles
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<PasswordHash>,
    #[serde(default)]
    pub profile_images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// Fresh profile with no images and both timestamps set to `now`
    pub fn new(id: impl Into<String>, email: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            password_hash: None,
            profile_images: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_password_hash(mut self, hash: PasswordHash) -> Self {
        self.password_hash = Some(hash);
        self
    }

    /// Outward view; drops the password hash
    pub fn view(&self) -> ProfileView {
        ProfileView {
            id: self.id.clone(),
            email: self.email.clone(),
            profile_images: self.profile_images.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn apply(&mut self, patch: ProfilePatch) {
        if let Some(images) = patch.profile_images {
            self.profile_images = images;
        }
        self.updated_at = patch.updated_at;
    }
}

/// Owner-scoped mutation. `updated_at` is always refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePatch {
    pub profile_images: Option<Vec<String>>,
    pub updated_at: DateTime<Utc>,
}

/// Trait for profile storage backends
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<UserProfile>, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<UserProfile>, StoreError>;

    /// Unique-constrained insert: `Conflict` if the id or the email is taken
    async fn insert(&self, profile: UserProfile) -> Result<UserProfile, StoreError>;

    /// Apply `patch` to an existing profile
    async fn update(&self, id: &str, patch: ProfilePatch) -> Result<UserProfile, StoreError>;

    /// Explicit create; a duplicate is an error
    async fn create(&self, profile: UserProfile) -> Result<UserProfile, StoreError> {
        self.insert(profile).await
    }

    /// Insert `profile`, or return the record already stored under its id.
    ///
    /// A conflict on email alone (the address belongs to a different id)
    /// stays a `Conflict`; handing one identity another identity's profile
    /// is never acceptable.
    async fn create_if_absent(&self, profile: UserProfile) -> Result<UserProfile, StoreError> {
        for attempt in 1..=CREATE_IF_ABSENT_ATTEMPTS {
            match self.insert(profile.clone()).await {
                Ok(created) => return Ok(created),
                Err(StoreError::Conflict) => {
                    counter!(PROFILE_CREATE_CONFLICT).increment(1);
                    if let Some(existing) = self.get_by_id(&profile.id).await? {
                        debug!(id = %profile.id, "profile created concurrently, returning existing");
                        return Ok(existing);
                    }
                    if self.get_by_email(&profile.email).await?.is_some() {
                        return Err(StoreError::Conflict);
                    }
                    // a racing insert holds the key but is not readable yet
                    debug!(attempt, id = %profile.id, "conflicting record not visible, retrying insert");
                    tokio::time::sleep(CREATE_RETRY_BACKOFF * attempt).await;
                },
                Err(e) => return Err(e),
            }
        }
        Err(StoreError::Unavailable(
            "create_if_absent did not converge".to_string(),
        ))
    }
}

/// In-memory store. The email index and the primary map are updated while
/// both entries are held, so a half-inserted profile is never visible.
#[derive(Clone, Default)]
pub struct MemoryProfileStore {
    profiles: Arc<DashMap<String, UserProfile>>,
    emails: Arc<DashMap<String, String>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.profiles.get(id).map(|p| p.value().clone()))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        let id = self.emails.get(email).map(|id| id.value().clone());
        match id {
            Some(id) => self.get_by_id(&id).await,
            None => Ok(None),
        }
    }

    async fn insert(&self, profile: UserProfile) -> Result<UserProfile, StoreError> {
        // lock order is always emails -> profiles
        let email_slot = match self.emails.entry(profile.email.clone()) {
            Entry::Occupied(_) => return Err(StoreError::Conflict),
            Entry::Vacant(slot) => slot,
        };
        match self.profiles.entry(profile.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(profile.clone());
                email_slot.insert(profile.id.clone());
                Ok(profile)
            },
        }
    }

    async fn update(&self, id: &str, patch: ProfilePatch) -> Result<UserProfile, StoreError> {
        let mut profile = self.profiles.get_mut(id).ok_or(StoreError::NotFound)?;
        profile.apply(patch);
        Ok(profile.value().clone())
    }
}

/// Flat-file store: one JSON document per profile plus an email index.
///
/// Layout under `root`:
/// - `users/<b64(id)>.json`
/// - `emails/<b64(email)>` containing the owning id
///
/// New files are written to a temp name and hard-linked into place, which
/// fails if the target exists; the filesystem is the uniqueness constraint.
#[derive(Clone)]
pub struct FlatFileProfileStore {
    root: PathBuf,
}

impl FlatFileProfileStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("users"))?;
        std::fs::create_dir_all(root.join("emails"))?;
        std::fs::create_dir_all(root.join("tmp"))?;
        Ok(Self { root })
    }

    fn profile_path(&self, id: &str) -> PathBuf {
        self.root
            .join("users")
            .join(format!("{}.json", URL_SAFE_NO_PAD.encode(id)))
    }

    fn email_path(&self, email: &str) -> PathBuf {
        self.root.join("emails").join(URL_SAFE_NO_PAD.encode(email))
    }

    fn temp_path(&self) -> PathBuf {
        self.root.join("tmp").join(Uuid::new_v4().to_string())
    }

    /// Atomically create `path` with `contents`; `Conflict` if it exists
    async fn create_exclusive(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let tmp = self.temp_path();
        tokio_fs::write(&tmp, contents).await?;
        let linked = tokio_fs::hard_link(&tmp, path).await;
        let _ = tokio_fs::remove_file(&tmp).await;
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(StoreError::Conflict),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically replace `path` with `contents`
    async fn replace(&self, path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let tmp = self.temp_path();
        tokio_fs::write(&tmp, contents).await?;
        tokio_fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Claim the email, then link the profile document.
    ///
    /// A claim that already names `profile.id` but has no document behind it
    /// is left over from an interrupted insert and is taken over.
    async fn link_profile(&self, profile: UserProfile) -> Result<UserProfile, StoreError> {
        let email_path = self.email_path(&profile.email);
        let claimed = match self.create_exclusive(&email_path, profile.id.as_bytes()).await {
            Ok(()) => true,
            Err(StoreError::Conflict) => {
                if !self.is_orphaned_claim(&email_path, &profile.id).await? {
                    return Err(StoreError::Conflict);
                }
                debug!(id = %profile.id, "taking over email claim with no profile behind it");
                false
            },
            Err(e) => return Err(e),
        };

        let json = serde_json::to_vec_pretty(&profile)?;
        if let Err(e) = self.create_exclusive(&self.profile_path(&profile.id), &json).await {
            // release the claim unless a document for this id and email now backs it
            let backed = matches!(
                self.get_by_id(&profile.id).await,
                Ok(Some(ref existing)) if existing.email == profile.email
            );
            if claimed && !backed {
                let _ = tokio_fs::remove_file(&email_path).await;
            }
            return Err(e);
        }
        Ok(profile)
    }

    async fn is_orphaned_claim(&self, email_path: &Path, id: &str) -> Result<bool, StoreError> {
        let owner = Self::read_optional(email_path).await?;
        if owner.as_deref() != Some(id.as_bytes()) {
            return Ok(false);
        }
        Ok(Self::read_optional(&self.profile_path(id)).await?.is_none())
    }

    async fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
        match tokio_fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ProfileStore for FlatFileProfileStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
        match Self::read_optional(&self.profile_path(id)).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        match Self::read_optional(&self.email_path(email)).await? {
            Some(id) => {
                let id = String::from_utf8(id)
                    .map_err(|_| StoreError::Unavailable("corrupt email index".to_string()))?;
                self.get_by_id(&id).await
            },
            None => Ok(None),
        }
    }

    async fn insert(&self, profile: UserProfile) -> Result<UserProfile, StoreError> {
        // runs detached: a dropped caller must not stop the write between the two links
        let store = self.clone();
        tokio::spawn(async move { store.link_profile(profile).await })
            .await
            .map_err(|e| StoreError::Unavailable(format!("insert task failed: {e}")))?
    }

    async fn update(&self, id: &str, patch: ProfilePatch) -> Result<UserProfile, StoreError> {
        let mut profile = self.get_by_id(id).await?.ok_or(StoreError::NotFound)?;
        profile.apply(patch);
        let json = serde_json::to_vec_pretty(&profile)?;
        self.replace(&self.profile_path(id), &json).await?;
        Ok(profile)
    }
}

/// Bound a store future by `deadline`; elapsing is an outage
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .map_err(|_| StoreError::Unavailable(format!("store call exceeded {deadline:?}")))?
}

/// Wraps a store so every primitive call is bounded by a deadline.
/// `create_if_absent` stays the trait's default, so each of its steps is bounded too.
#[derive(Clone)]
pub struct BoundedStore {
    inner: Arc<dyn ProfileStore>,
    deadline: Duration,
}

impl BoundedStore {
    pub fn new(inner: Arc<dyn ProfileStore>, deadline: Duration) -> Self {
        Self { inner, deadline }
    }
}

#[async_trait]
impl ProfileStore for BoundedStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<UserProfile>, StoreError> {
        with_deadline(self.deadline, self.inner.get_by_id(id)).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        with_deadline(self.deadline, self.inner.get_by_email(email)).await
    }

    async fn insert(&self, profile: UserProfile) -> Result<UserProfile, StoreError> {
        with_deadline(self.deadline, self.inner.insert(profile)).await
    }

    async fn update(&self, id: &str, patch: ProfilePatch) -> Result<UserProfile, StoreError> {
        with_deadline(self.deadline, self.inner.update(id, patch)).await
    }
}

/// Open the configured backend, bounded by the configured deadline
pub fn open_store(settings: &StoreSettings) -> Result<Arc<dyn ProfileStore>, StoreError> {
    let inner: Arc<dyn ProfileStore> = match settings.backend {
        StoreBackend::Memory => {
            info!("using in-memory profile store");
            Arc::new(MemoryProfileStore::new())
        },
        StoreBackend::FlatFile => {
            info!(data_dir = %settings.data_dir.display(), "using flat-file profile store");
            Arc::new(FlatFileProfileStore::new(&settings.data_dir)?)
        },
    };
    Ok(Arc::new(BoundedStore::new(
        inner,
        Duration::from_millis(settings.timeout_ms),
    )))
}
