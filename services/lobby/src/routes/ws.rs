//! Per-lobby WebSocket relay
//!
//! Members of a lobby connect to `/api/lobby/ws/:lobby_id`. Every inbound
//! JSON text frame is relayed to the other connections of the same lobby,
//! and server-side lobby events arrive on the same socket. A connection is
//! closed by the server once its user leaves the lobby or the lobby closes.

use axum::{
    Router,
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    broadcast::CONNECTION_BUFFER,
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/lobby/ws/:lobby_id", get(lobby_ws_handler))
}

/// Browsers cannot set headers on the handshake, so the token may come as `?token=`
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    pub token: Option<String>,
}

/// The header wins over the query parameter
fn pick_token<'a>(header: Option<&'a str>, query: Option<&'a str>) -> Option<&'a str> {
    header.or(query).filter(|token| !token.is_empty())
}

pub async fn lobby_ws_handler(
    State(state): State<AppState>,
    Path(lobby_id): Path<i64>,
    Query(params): Query<WsParams>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    ws: WebSocketUpgrade,
) -> ApiResult<Response> {
    let header_token = bearer
        .as_ref()
        .map(|TypedHeader(Authorization(credentials))| credentials.token());
    let token =
        pick_token(header_token, params.token.as_deref()).ok_or(ApiError::Unauthorized)?;

    let user = state.auth.resolve_token(token).await?;

    state.lobby_repository.get_lobby(lobby_id).await?;
    if !state.lobby_repository.is_member(lobby_id, user.id).await? {
        warn!("User {} tried to connect to lobby {} without joining", user.id, lobby_id);
        return Err(ApiError::Forbidden("Not a member of this lobby".to_string()));
    }

    info!("User {} connecting to lobby {}", user.id, lobby_id);
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, lobby_id, user.id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, lobby_id: i64, user_id: i64) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = mpsc::channel::<String>(CONNECTION_BUFFER);
    let connection_id = state.broadcast.register(lobby_id, user_id, tx).await;
    debug!(
        "Lobby {} has {} open connections",
        lobby_id,
        state.broadcast.connection_count(lobby_id).await
    );

    // drain this connection's queue into the socket; the queue ends when
    // the registry drops the connection
    let mut send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sender.send(Message::Text(payload)).await.is_err() {
                return;
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    let registry = state.broadcast.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<Value>(&text) {
                    Ok(value) => {
                        let delivered = registry
                            .broadcast(lobby_id, &value, Some(connection_id))
                            .await;
                        debug!(
                            "Relayed message from user {} on lobby {} to {} connections",
                            user_id, lobby_id, delivered
                        );
                    }
                    Err(e) => warn!(
                        "Dropped non-JSON frame from user {} on lobby {}: {}",
                        user_id, lobby_id, e
                    ),
                },
                Message::Close(_) => break,
                // binary frames carry nothing we relay; pings are answered by axum
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.broadcast.unregister(lobby_id, connection_id).await;
    info!("User {} disconnected from lobby {}", user_id, lobby_id);
}
