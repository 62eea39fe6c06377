// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const TOKEN_ISSUED: &str = "auth.token.issued";
pub const VERIFY_ACCEPTED: &str = "auth.verify.accepted";
pub const VERIFY_REJECTED: &str = "auth.verify.rejected";
pub const LOGIN_FAILED: &str = "auth.login.failed";
pub const PROFILE_CREATED: &str = "profile.created";
pub const PROFILE_CREATE_CONFLICT: &str = "profile.create.conflict";
