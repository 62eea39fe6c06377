//! Provider-delegated verification and lazy profile creation over HTTP.
mod common;

use axum::http::{Method, StatusCode};
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_first_login_creates_profile_once() {
    let (store, shared) = memory_store();
    let app = provider_app(shared);
    let token = provider_token("firebase-uid-7", Some("new@x.com"));

    let (status, first) = send(&app, Method::POST, "/verify", None, Some(json!({"token": token}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["message"], "Token is valid");
    assert_eq!(first["data"]["uid"], "firebase-uid-7");
    assert_eq!(first["data"]["email"], "new@x.com");
    assert_eq!(first["data"]["user"]["id"], "firebase-uid-7");
    assert_eq!(first["data"]["user"]["profile_images"], json!([]));
    assert_eq!(store.len(), 1);

    let (status, second) = send(&app, Method::POST, "/verify", None, Some(json!({"token": token}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["data"]["user"], first["data"]["user"]);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_token_without_email_is_unauthorized() {
    let (store, shared) = memory_store();
    let app = provider_app(shared);
    let token = provider_token("firebase-uid-8", None);
    let (status, body) = send(&app, Method::POST, "/verify", None, Some(json!({"token": token}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Authentication failed");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_password_routes_absent_under_provider() {
    let (_, store) = memory_store();
    let app = provider_app(store);
    let (status, _) = send(
        &app,
        Method::POST,
        "/register",
        None,
        Some(json!({"email": "a@x.com", "password": "longenough1"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_profile_before_first_verify_is_not_found() {
    let (_, store) = memory_store();
    let app = provider_app(store);
    let token = provider_token("firebase-uid-9", Some("n@x.com"));

    let (status, body) = send(&app, Method::GET, "/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NF_001");

    send(&app, Method::POST, "/verify", None, Some(json!({"token": token}))).await;
    let (status, body) = send(&app, Method::GET, "/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], "firebase-uid-9");
}
