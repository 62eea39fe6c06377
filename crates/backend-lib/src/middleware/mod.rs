// crates/backend-lib/src/middleware/mod.rs

//! Request extractors for bearer credentials.

pub mod bearer;

pub use bearer::{Authenticated, BearerToken};
