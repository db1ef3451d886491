//! Custom error types for the lobby service

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failures of lobby registry operations
#[derive(Error, Debug)]
pub enum LobbyError {
    #[error("Lobby not found")]
    NotFound,

    #[error("Lobby is full")]
    LobbyFull,

    #[error("Game already started")]
    GameAlreadyStarted,

    #[error("Already in lobby")]
    AlreadyJoined,

    #[error("Player not in lobby")]
    NotInLobby,

    #[error("Only the lobby creator can start the game")]
    NotCreator,

    #[error("At least two players are needed to start the game")]
    NotEnoughPlayers,

    #[error("Not all players are ready")]
    PlayersNotReady,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl LobbyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            LobbyError::NotFound | LobbyError::NotInLobby => StatusCode::NOT_FOUND,
            LobbyError::LobbyFull
            | LobbyError::GameAlreadyStarted
            | LobbyError::AlreadyJoined
            | LobbyError::NotEnoughPlayers
            | LobbyError::PlayersNotReady => StatusCode::BAD_REQUEST,
            LobbyError::NotCreator => StatusCode::FORBIDDEN,
            LobbyError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Failures of the credential store and token resolution
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown username or wrong password, deliberately indistinguishable
    #[error("Incorrect username or password")]
    InvalidCredentials,

    /// Missing, malformed, expired or orphaned token
    #[error("Could not validate credentials")]
    Unauthorized,

    #[error("{0}")]
    Invalid(String),

    #[error("Username already registered")]
    UsernameTaken,

    #[error("Email already registered")]
    EmailTaken,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Custom error type for the HTTP surface
#[derive(Error, Debug)]
pub enum ApiError {
    /// Unauthorized access
    #[error("Could not validate credentials")]
    Unauthorized,

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    /// Bad request with message
    #[error("{0}")]
    BadRequest(String),

    /// Lobby registry failure
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// Credential store failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,
}

impl ApiError {
    fn status_and_detail(&self) -> (StatusCode, String) {
        match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Lobby(LobbyError::Database(e)) => {
                error!("Lobby store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Lobby(e) => (e.status_code(), e.to_string()),
            ApiError::Auth(AuthError::InvalidCredentials | AuthError::Unauthorized) => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            ApiError::Auth(
                AuthError::Invalid(_) | AuthError::UsernameTaken | AuthError::EmailTaken,
            ) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Auth(AuthError::Internal(e)) => {
                error!("Credential store error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalServerError => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();

        let body = Json(json!({
            "detail": detail,
        }));

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
