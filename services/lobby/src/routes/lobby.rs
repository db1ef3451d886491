//! Lobby lifecycle endpoints
//!
//! Successful mutations are announced to the lobby's open WebSocket
//! connections after the transaction has committed.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::{
    broadcast::{LobbyEvent, LobbyEventKind},
    error::{ApiError, ApiResult},
    extract::CurrentUser,
    models::{GameStartResponse, LobbyDetail, LobbyResponse, NewLobby, ReadyRequest},
    repositories::LeaveOutcome,
    state::AppState,
    validation::{validate_lobby_name, validate_max_players},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/lobby", get(list_lobbies).post(create_lobby))
        .route("/api/lobby/", get(list_lobbies).post(create_lobby))
        .route("/api/lobby/:id", get(get_lobby))
        .route("/api/lobby/:id/join", post(join_lobby))
        .route("/api/lobby/:id/leave", post(leave_lobby))
        .route("/api/lobby/:id/ready", post(set_ready))
        .route("/api/lobby/:id/start", post(start_game))
}

/// Create a lobby owned by the caller
pub async fn create_lobby(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<NewLobby>,
) -> ApiResult<impl IntoResponse> {
    let name = validate_lobby_name(&payload.name).map_err(ApiError::BadRequest)?;
    validate_max_players(payload.max_players).map_err(ApiError::BadRequest)?;

    let lobby = state
        .lobby_repository
        .create_lobby(user.id, &name, payload.max_players)
        .await?;

    Ok(Json(LobbyResponse::from(lobby)))
}

/// Lobbies that can still be joined
pub async fn list_lobbies(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let lobbies = state.lobby_repository.list_open_lobbies().await?;

    Ok(Json(
        lobbies
            .into_iter()
            .map(LobbyResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn get_lobby(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let (lobby, players) = state.lobby_repository.get_lobby_detail(id).await?;

    Ok(Json(LobbyDetail {
        lobby: LobbyResponse::from(lobby),
        players,
    }))
}

pub async fn join_lobby(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let lobby = state.lobby_repository.join_lobby(id, user.id).await?;

    announce(
        &state,
        LobbyEvent::new(
            LobbyEventKind::PlayerJoined,
            id,
            user.id,
            json!({
                "username": user.username,
                "current_players": lobby.current_players,
            }),
        ),
    )
    .await;

    Ok(Json(LobbyResponse::from(lobby)))
}

pub async fn leave_lobby(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    match state.lobby_repository.leave_lobby(id, user.id).await? {
        LeaveOutcome::Closed => {
            announce(
                &state,
                LobbyEvent::new(LobbyEventKind::LobbyClosed, id, user.id, Value::Null),
            )
            .await;
            state.broadcast.close_lobby(id).await;
        }
        LeaveOutcome::Left { lobby, new_creator } => {
            state.broadcast.disconnect_user(id, user.id).await;

            announce(
                &state,
                LobbyEvent::new(
                    LobbyEventKind::PlayerLeft,
                    id,
                    user.id,
                    json!({
                        "username": user.username,
                        "current_players": lobby.current_players,
                    }),
                ),
            )
            .await;

            if let Some(creator_id) = new_creator {
                announce(
                    &state,
                    LobbyEvent::new(
                        LobbyEventKind::CreatorChanged,
                        id,
                        user.id,
                        json!({ "creator_id": creator_id }),
                    ),
                )
                .await;
            }
        }
    }

    Ok(Json(json!({ "message": "Left lobby" })))
}

/// Toggle the caller's ready flag
pub async fn set_ready(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(payload): Json<ReadyRequest>,
) -> ApiResult<impl IntoResponse> {
    let player = state
        .lobby_repository
        .set_ready(id, user.id, payload.is_ready)
        .await?;

    announce(
        &state,
        LobbyEvent::new(
            LobbyEventKind::PlayerReady,
            id,
            user.id,
            json!({ "is_ready": player.is_ready }),
        ),
    )
    .await;

    Ok(Json(player))
}

/// Start the game; creator only
pub async fn start_game(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let (game, player_number) = state.lobby_repository.start_game(id, user.id).await?;

    announce(
        &state,
        LobbyEvent::new(
            LobbyEventKind::GameStarted,
            id,
            user.id,
            json!({ "game_id": game.id }),
        ),
    )
    .await;

    Ok(Json(GameStartResponse {
        message: "Game started".to_string(),
        game_id: game.id,
        player_number,
    }))
}

async fn announce(state: &AppState, event: LobbyEvent) {
    let delivered = state
        .broadcast
        .broadcast(event.lobby_id, &event.to_value(), None)
        .await;
    tracing::debug!(
        "Event {:?} on lobby {} delivered to {} connections",
        event.kind,
        event.lobby_id,
        delivered
    );
}
