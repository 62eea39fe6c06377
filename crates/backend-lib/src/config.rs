// ============================
// authgate-backend/src/config.rs
// ============================
//! Configuration management.
//!
//! Settings are read once at startup from built-in defaults, an optional TOML
//! file and `AUTHGATE_`-prefixed environment variables (nested keys use `__`,
//! e.g. `AUTHGATE_TOKEN__SECRET`). There is no hot reload.
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroize;

pub use crate::auth::PasswordRequirements;
use crate::auth::{DEFAULT_TOKEN_TTL, MIN_PASSWORD_LENGTH};

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "authgate.toml";

/// Environment variable prefix
pub const ENV_PREFIX: &str = "AUTHGATE_";

/// Minimum length of the HMAC signing secret in bytes
pub const MIN_SECRET_BYTES: usize = 32;

const MIN_HASH_LOG_N: u8 = 8;
const MAX_HASH_LOG_N: u8 = 20;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("failed to read provider public key {path}: {source}")]
    PublicKey {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Which credential strategy the gateway runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStrategy {
    /// HS256 tokens minted by this service, password register/login enabled
    SelfIssued,
    /// Tokens issued and verified by an external identity provider
    Provider,
}

/// Which profile store backs the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    FlatFile,
}

/// Shared signing secret. Redacted in `Debug`, wiped on drop.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

/// Self-issued token settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSettings {
    /// HMAC secret shared by issuer and verifier
    pub secret: Secret,
    /// Token lifetime in seconds
    pub ttl_secs: u64,
}

/// Profile store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Root directory of the flat-file store
    pub data_dir: PathBuf,
    /// Deadline for every store call, in milliseconds
    pub timeout_ms: u64,
}

/// External identity provider settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSettings {
    /// Expected `aud` of provider-issued ID tokens
    pub project_id: Option<String>,
    /// Expected `iss`; not checked when unset
    pub issuer: Option<String>,
    /// PEM-encoded RSA public key, inline
    pub public_key_pem: Option<String>,
    /// PEM-encoded RSA public key, read from disk at startup
    pub public_key_path: Option<PathBuf>,
    /// Deadline for a provider verification, in milliseconds
    pub timeout_ms: u64,
}

impl ProviderSettings {
    /// Resolve the configured public key, preferring the inline value
    pub fn public_key(&self) -> Result<Option<String>, ConfigError> {
        if let Some(pem) = &self.public_key_pem {
            return Ok(Some(pem.clone()));
        }
        match &self.public_key_path {
            Some(path) => std::fs::read_to_string(path)
                .map(Some)
                .map_err(|source| ConfigError::PublicKey {
                    path: path.clone(),
                    source,
                }),
            None => Ok(None),
        }
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Log level
    pub log_level: String,
    /// Credential strategy selected at startup
    pub strategy: CredentialStrategy,
    pub token: TokenSettings,
    pub store: StoreSettings,
    pub provider: ProviderSettings,
    /// Password requirements for registration
    pub password_requirements: PasswordRequirements,
    /// log2 of the scrypt N parameter used for new password hashes
    pub password_hash_log_n: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            log_level: "info".to_string(),
            strategy: CredentialStrategy::SelfIssued,
            token: TokenSettings {
                secret: Secret::default(),
                ttl_secs: DEFAULT_TOKEN_TTL.as_secs(),
            },
            store: StoreSettings {
                backend: StoreBackend::Memory,
                data_dir: PathBuf::from("data"),
                timeout_ms: 2_000,
            },
            provider: ProviderSettings {
                timeout_ms: 5_000,
                ..ProviderSettings::default()
            },
            password_requirements: PasswordRequirements::default(),
            password_hash_log_n: scrypt::Params::RECOMMENDED_LOG_N,
        }
    }
}

impl Settings {
    /// Load settings from `authgate.toml` (if present) and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load settings from the given TOML file (if present) and the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings: Self = Self::figment(path.as_ref())
            .extract()
            .map_err(Box::new)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Provider chain: defaults, then file, then environment
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Check cross-field constraints that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown log level {:?}",
                self.log_level
            )));
        }
        if self.token.ttl_secs == 0 {
            return Err(ConfigError::Invalid("token.ttl_secs must be positive".into()));
        }
        if self.store.timeout_ms == 0 || self.provider.timeout_ms == 0 {
            return Err(ConfigError::Invalid("timeouts must be positive".into()));
        }
        let req = &self.password_requirements;
        if req.min_length < MIN_PASSWORD_LENGTH || req.max_length < req.min_length {
            return Err(ConfigError::Invalid(format!(
                "password length bounds must satisfy {MIN_PASSWORD_LENGTH} <= min_length <= max_length"
            )));
        }
        if !(MIN_HASH_LOG_N..=MAX_HASH_LOG_N).contains(&self.password_hash_log_n) {
            return Err(ConfigError::Invalid(format!(
                "password_hash_log_n must be within {MIN_HASH_LOG_N}..={MAX_HASH_LOG_N}"
            )));
        }
        match self.strategy {
            CredentialStrategy::SelfIssued => {
                if self.token.secret.len() < MIN_SECRET_BYTES {
                    return Err(ConfigError::Invalid(format!(
                        "token.secret must be at least {MIN_SECRET_BYTES} bytes"
                    )));
                }
            },
            CredentialStrategy::Provider => {
                if self.provider.project_id.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::Invalid("provider.project_id is required".into()));
                }
                if self.provider.public_key_pem.is_none() && self.provider.public_key_path.is_none() {
                    return Err(ConfigError::Invalid(
                        "provider.public_key_pem or provider.public_key_path is required".into(),
                    ));
                }
            },
        }
        Ok(())
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token.ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store.timeout_ms)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider.timeout_ms)
    }
}
