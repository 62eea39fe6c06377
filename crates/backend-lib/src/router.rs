// ============================
// authgate-backend/src/router.rs
// ============================
//! HTTP routes.
use authgate_common::{
    ApiResponse, AuthResponse, LoginRequest, ProfileUpdateRequest, ProfileView, RegisterRequest,
    VerifyRequest, VerifyResponse,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::PasswordLogin;
use crate::error::AppError;
use crate::middleware::Authenticated;
use crate::validation::ValidationError;
use crate::AppState;

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

/// Build the router. `/register` and `/login` exist only when the
/// self-issued strategy is configured.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/verify", post(verify))
        .route("/profile", get(get_profile).put(update_profile));

    if state.password_login.is_some() {
        router = router
            .route("/register", post(register))
            .route("/login", post(login));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<ApiResponse<()>> {
    Json(ApiResponse::message_only("Auth service is healthy"))
}

/// Verify a credential and fetch-or-create its profile
async fn verify(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<VerifyResponse> {
    let Json(request) = payload?;
    let token = request.token.trim();
    if token.is_empty() {
        return Err(ValidationError::MissingField("token").into());
    }

    let claim = state.verifier.verify(token).await?;
    let profile = state.reconciler.reconcile(&claim).await?;

    Ok(Json(
        ApiResponse::ok(VerifyResponse {
            uid: claim.subject_id,
            email: claim.email,
            user: profile.view(),
        })
        .with_message("Token is valid"),
    ))
}

async fn get_profile(
    State(state): State<AppState>,
    Authenticated(claim): Authenticated,
) -> ApiResult<ProfileView> {
    let profile = state.reconciler.profile(&claim.subject_id).await?;
    Ok(Json(ApiResponse::ok(profile.view())))
}

async fn update_profile(
    State(state): State<AppState>,
    Authenticated(claim): Authenticated,
    payload: Result<Json<ProfileUpdateRequest>, JsonRejection>,
) -> ApiResult<ProfileView> {
    let Json(request) = payload?;
    let profile = state
        .reconciler
        .update_profile(&claim.subject_id, request.profile_images)
        .await?;
    Ok(Json(
        ApiResponse::ok(profile.view()).with_message("Profile updated successfully"),
    ))
}

fn password_login(state: &AppState) -> Result<&PasswordLogin, AppError> {
    state.password_login.as_ref().ok_or(AppError::NotFound)
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<AuthResponse>>), AppError> {
    let Json(request) = payload?;
    let (token, profile) = password_login(&state)?
        .register(&request.email, request.password)
        .await?;
    let body = ApiResponse::ok(AuthResponse {
        token: token.into_inner(),
        user: profile.view(),
    })
    .with_message("User registered successfully");
    Ok((StatusCode::CREATED, Json(body)))
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let Json(request) = payload?;
    let (token, profile) = password_login(&state)?
        .login(&request.email, request.password)
        .await?;
    Ok(Json(
        ApiResponse::ok(AuthResponse {
            token: token.into_inner(),
            user: profile.view(),
        })
        .with_message("Login successful"),
    ))
}
