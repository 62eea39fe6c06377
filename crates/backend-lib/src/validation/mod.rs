// ============================
// authgate-backend/src/validation/mod.rs
// ============================
//! Request field validation.

use crate::auth::{validate_password_strength, PasswordRequirements};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const MAX_EMAIL_LENGTH: usize = 254; // RFC 5321 SMTP limit
const MAX_PROFILE_IMAGES: usize = 20;
const MAX_IMAGE_URL_LENGTH: usize = 2048;

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
static IMAGE_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s<>]+$").unwrap());

/// Possible validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Invalid password: {0}")]
    InvalidPassword(String),

    #[error("Invalid profile images: {0}")]
    InvalidProfileImages(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Canonical form used for every email lookup and uniqueness check
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Validate an email address
pub fn validate_email(email: &str) -> ValidationResult<&str> {
    if email.is_empty() {
        return Err(ValidationError::MissingField("email"));
    }

    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail(format!(
            "Email must not exceed {MAX_EMAIL_LENGTH} characters"
        )));
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err(ValidationError::InvalidEmail(
            "Email format is invalid".to_string(),
        ));
    }

    Ok(email)
}

/// Validate a password against the configured requirements
pub fn validate_password<'a>(
    password: &'a str,
    requirements: &PasswordRequirements,
) -> ValidationResult<&'a str> {
    if password.is_empty() {
        return Err(ValidationError::MissingField("password"));
    }

    if !validate_password_strength(password, requirements) {
        return Err(ValidationError::InvalidPassword(format!(
            "Password must be between {} and {} characters and meet the complexity rules",
            requirements.min_length, requirements.max_length
        )));
    }

    Ok(password)
}

/// Validate an owner-supplied profile image list
pub fn validate_profile_images(images: &[String]) -> ValidationResult<()> {
    if images.len() > MAX_PROFILE_IMAGES {
        return Err(ValidationError::InvalidProfileImages(format!(
            "At most {MAX_PROFILE_IMAGES} images are allowed"
        )));
    }

    for (idx, url) in images.iter().enumerate() {
        if url.len() > MAX_IMAGE_URL_LENGTH || !IMAGE_URL_REGEX.is_match(url) {
            return Err(ValidationError::InvalidProfileImages(format!(
                "Image {idx} must be an http(s) URL of at most {MAX_IMAGE_URL_LENGTH} characters"
            )));
        }
    }

    Ok(())
}
