//! User listing and presence

use axum::{
    Json, Router,
    extract::State,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde_json::json;

use crate::{
    error::{ApiError, ApiResult},
    extract::CurrentUser,
    models::UserResponse,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users))
        .route("/api/users/", get(list_users))
        .route("/api/users/online", get(online_users))
        .route("/api/users/update_online_status", post(update_online_status))
}

/// All active users with their online flag
pub async fn list_users(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let users = state.presence.list_users(Utc::now()).await.map_err(|e| {
        tracing::error!("Failed to list users: {}", e);
        ApiError::InternalServerError
    })?;

    Ok(Json(users))
}

/// Active users seen within the presence threshold
pub async fn online_users(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let users = state
        .presence
        .list_online_users(Utc::now())
        .await
        .map_err(|e| {
            tracing::error!("Failed to list online users: {}", e);
            ApiError::InternalServerError
        })?;

    Ok(Json(users.iter().map(UserResponse::from).collect::<Vec<_>>()))
}

pub async fn update_online_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> ApiResult<impl IntoResponse> {
    state.presence.touch(&user).await.map_err(|e| {
        tracing::error!("Failed to update last_seen of user {}: {}", user.id, e);
        ApiError::InternalServerError
    })?;

    Ok(Json(json!({ "status": "online_status_updated" })))
}
