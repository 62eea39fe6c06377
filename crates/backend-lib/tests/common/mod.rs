//! Shared setup for the gateway integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use authgate_backend::{
    auth::{IdTokenProvider, ProviderVerifier, SelfIssuedVerifier},
    config::{CredentialStrategy, Secret, Settings},
    router::create_router,
    storage::{MemoryProfileStore, ProfileStore},
    AppState,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

pub const SECRET: &str = "integration-secret-0123456789abcdef";
pub const PROJECT_ID: &str = "demo-project";
pub const PROVIDER_PRIVATE: &str = include_str!("../fixtures/provider_private.pem");
pub const PROVIDER_PUBLIC: &str = include_str!("../fixtures/provider_public.pem");

/// Settings for the self-issued strategy with a cheap password hash cost
pub fn self_issued_settings() -> Settings {
    let mut settings = Settings::default();
    settings.token.secret = Secret::new(SECRET);
    settings.password_hash_log_n = 8;
    settings
}

pub fn self_issued_app(store: Arc<dyn ProfileStore>) -> Router {
    let verifier = Arc::new(SelfIssuedVerifier::new(SECRET.as_bytes()));
    let state = AppState::new(self_issued_settings(), store, verifier).expect("app state");
    create_router(state)
}

pub fn provider_app(store: Arc<dyn ProfileStore>) -> Router {
    let mut settings = Settings::default();
    settings.strategy = CredentialStrategy::Provider;
    settings.provider.project_id = Some(PROJECT_ID.to_string());
    settings.provider.public_key_pem = Some(PROVIDER_PUBLIC.to_string());

    let provider = IdTokenProvider::from_settings(&settings.provider).expect("provider");
    let verifier = Arc::new(ProviderVerifier::new(Arc::new(provider), settings.provider_timeout()));
    let state = AppState::new(settings, store, verifier).expect("app state");
    create_router(state)
}

pub fn memory_store() -> (MemoryProfileStore, Arc<dyn ProfileStore>) {
    let store = MemoryProfileStore::new();
    let shared: Arc<dyn ProfileStore> = Arc::new(store.clone());
    (store, shared)
}

/// An RS256 ID token as an external provider would mint it
pub fn provider_token(subject: &str, email: Option<&str>) -> String {
    let now = Utc::now().timestamp();
    let mut claims = json!({
        "sub": subject,
        "aud": PROJECT_ID,
        "iat": now,
        "exp": now + 3600,
    });
    if let Some(email) = email {
        claims["email"] = json!(email);
    }
    let key = EncodingKey::from_rsa_pem(PROVIDER_PRIVATE.as_bytes()).expect("private key");
    encode(&Header::new(Algorithm::RS256), &claims, &key).expect("sign")
}

/// Send a request and decode the JSON envelope
pub async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}
