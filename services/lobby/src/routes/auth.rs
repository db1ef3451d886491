//! Registration, login and the current user

use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::{
    error::{ApiError, ApiResult},
    extract::CurrentUser,
    models::{LoginCredentials, NewUser, TokenResponse, UserResponse},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/login-json", post(login_json))
        .route("/api/auth/me", get(me))
}

/// Register a new account
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    let user = state.auth.register(&payload).await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

/// OAuth2 password-flow login
pub async fn login(
    State(state): State<AppState>,
    Form(credentials): Form<LoginCredentials>,
) -> ApiResult<Json<TokenResponse>> {
    issue_for(&state, &credentials).await
}

pub async fn login_json(
    State(state): State<AppState>,
    Json(credentials): Json<LoginCredentials>,
) -> ApiResult<Json<TokenResponse>> {
    issue_for(&state, &credentials).await
}

/// Get the authenticated user
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::from(&user))
}

async fn issue_for(state: &AppState, credentials: &LoginCredentials) -> ApiResult<Json<TokenResponse>> {
    let user = state
        .auth
        .authenticate(&credentials.username, &credentials.password)
        .await?;

    state.presence.touch(&user).await.map_err(|e| {
        tracing::error!("Failed to record login activity: {}", e);
        ApiError::InternalServerError
    })?;

    let token = state.auth.issue_token(&user)?;
    Ok(Json(TokenResponse::bearer(token)))
}
