// ============================
// authgate-backend/src/auth/mod.rs
// ============================
//! Authentication module: password hashing, token minting and the two
//! credential verification strategies.

pub mod claims;
pub mod password;
pub mod password_login;
pub mod provider;
pub mod token;
pub mod verifier;

pub use claims::{IdentityClaim, TokenClaims};
pub use password::{
    hash_password, validate_password_strength, verify_password, PasswordAuthenticator,
    PasswordError, PasswordHash, PasswordRequirements, MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH,
};
pub use password_login::PasswordLogin;
pub use provider::{IdTokenProvider, IdentityProvider, ProviderClaims, ProviderError};
pub use token::{SignedToken, TokenError, TokenIssuer, DEFAULT_TOKEN_TTL, TOKEN_ALGORITHM};
pub use verifier::{build_verifier, CredentialVerifier, ProviderVerifier, SelfIssuedVerifier};
