// crates/backend-lib/src/middleware/bearer.rs

//! Bearer credential extraction.
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::auth::IdentityClaim;
use crate::error::AppError;
use crate::AppState;

/// Raw credential from the `Authorization` header.
/// Both `Bearer <token>` and a bare token are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken(pub String);

impl BearerToken {
    fn parse(header: &str) -> Option<Self> {
        let header = header.trim();
        let token = match header.split_once(' ') {
            Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim(),
            Some(_) => return None,
            None => header,
        };
        (!token.is_empty()).then(|| Self(token.to_string()))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(Self::parse)
            .ok_or(AppError::Unauthorized)
    }
}

/// A verified identity claim for the request's bearer credential
#[derive(Debug, Clone)]
pub struct Authenticated(pub IdentityClaim);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let claim = state.verifier.verify(&token).await?;
        Ok(Self(claim))
    }
}
