// ================
// common/src/lib.rs
// ================
//! Common request and response types
//! exchanged between the authentication gateway and its clients.
//! Nothing in here carries a password hash; the gateway converts its stored
//! profile records into [`ProfileView`] before anything leaves the process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload for password registration
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

/// Payload for password login
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Payload for explicit credential verification
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerifyRequest {
    pub token: String,
}

/// Owner-scoped profile update. Only the image list is writable by clients;
/// `email`, `id` and the timestamps are ignored if a client sends them.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ProfileUpdateRequest {
    #[serde(default)]
    pub profile_images: Option<Vec<String>>,
}

/// Outward representation of a user profile
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ProfileView {
    pub id: String,
    pub email: String,
    pub profile_images: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Returned by register and login
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthResponse {
    pub token: String,
    pub user: ProfileView,
}

/// Returned by `/verify`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerifyResponse {
    pub uid: String,
    pub email: String,
    pub user: ProfileView,
}

/// Generic response envelope used by every endpoint
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

/// Machine-readable error carried in a failed [`ApiResponse`]
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    /// Set when the client may retry the same request later.
    #[serde(default)]
    pub retryable: bool,
}

impl<T> ApiResponse<T> {
    /// Successful response carrying `data`
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
        }
    }

    /// Attach a human readable message
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Failed response
    pub fn failure(error: ErrorBody) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error),
        }
    }
}

impl ApiResponse<()> {
    /// Successful response without a payload
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_envelope_omits_data() {
        let resp: ApiResponse<ProfileView> = ApiResponse::failure(ErrorBody {
            code: "AUTH_001".to_string(),
            message: "Authentication failed".to_string(),
            retryable: false,
        });
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["success"], false);
        assert!(json.get("data").is_none());
        assert_eq!(json["error"]["code"], "AUTH_001");
    }

    #[test]
    fn update_request_ignores_unknown_fields() {
        let req: ProfileUpdateRequest = serde_json::from_str(
            r#"{"email":"evil@x.com","profile_images":["https://cdn/x.png"]}"#,
        )
        .unwrap();
        assert_eq!(req.profile_images.unwrap(), vec!["https://cdn/x.png"]);
    }

    #[test]
    fn health_envelope_has_message_only() {
        let json = serde_json::to_value(ApiResponse::message_only("ok")).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "ok");
        assert!(json.get("error").is_none());
    }
}
