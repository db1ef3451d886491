//! Per-lobby fan-out of JSON messages to open WebSocket connections
//!
//! Each connection is represented by the sending half of a bounded queue
//! drained by that connection's writer task. Delivery is best effort: a
//! full or closed queue drops the message for that connection only.
//! Removing a connection drops its sender, which ends the writer task once
//! the queued messages are flushed.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info};
use uuid::Uuid;

/// Messages a single connection may have queued before it starts losing them
pub const CONNECTION_BUFFER: usize = 64;

/// Identifies one registered connection
pub type ConnectionId = Uuid;

struct Connection {
    user_id: i64,
    sender: mpsc::Sender<String>,
}

type Connections = HashMap<ConnectionId, Connection>;

/// Registry of open connections, keyed by lobby
#[derive(Clone, Default)]
pub struct BroadcastRegistry {
    lobbies: Arc<RwLock<HashMap<i64, Connections>>>,
}

impl BroadcastRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection of `user_id` to a lobby's set
    pub async fn register(
        &self,
        lobby_id: i64,
        user_id: i64,
        sender: mpsc::Sender<String>,
    ) -> ConnectionId {
        let id = Uuid::new_v4();
        let mut lobbies = self.lobbies.write().await;
        lobbies
            .entry(lobby_id)
            .or_default()
            .insert(id, Connection { user_id, sender });

        info!(
            "Connection {} of user {} registered on lobby {}",
            id, user_id, lobby_id
        );
        id
    }

    /// Remove a connection. Removing an unknown connection is a no-op.
    pub async fn unregister(&self, lobby_id: i64, id: ConnectionId) -> bool {
        let mut lobbies = self.lobbies.write().await;
        let Some(connections) = lobbies.get_mut(&lobby_id) else {
            return false;
        };

        let removed = connections.remove(&id).is_some();
        if connections.is_empty() {
            lobbies.remove(&lobby_id);
        }

        if removed {
            info!("Connection {} unregistered from lobby {}", id, lobby_id);
        }
        removed
    }

    /// Drop every connection `user_id` holds on a lobby.
    ///
    /// Returns how many connections were removed.
    pub async fn disconnect_user(&self, lobby_id: i64, user_id: i64) -> usize {
        let mut lobbies = self.lobbies.write().await;
        let Some(connections) = lobbies.get_mut(&lobby_id) else {
            return 0;
        };

        let before = connections.len();
        connections.retain(|_, connection| connection.user_id != user_id);
        let removed = before - connections.len();
        if connections.is_empty() {
            lobbies.remove(&lobby_id);
        }

        if removed > 0 {
            info!(
                "Disconnected {} connections of user {} from lobby {}",
                removed, user_id, lobby_id
            );
        }
        removed
    }

    /// Drop every connection of a lobby
    pub async fn close_lobby(&self, lobby_id: i64) -> usize {
        let removed = self
            .lobbies
            .write()
            .await
            .remove(&lobby_id)
            .map_or(0, |connections| connections.len());

        if removed > 0 {
            info!("Closed {} connections of lobby {}", removed, lobby_id);
        }
        removed
    }

    /// Send `message` to every connection of a lobby except `except`.
    ///
    /// Returns how many connections accepted the message.
    pub async fn broadcast(
        &self,
        lobby_id: i64,
        message: &Value,
        except: Option<ConnectionId>,
    ) -> usize {
        let payload = message.to_string();
        let lobbies = self.lobbies.read().await;
        let Some(connections) = lobbies.get(&lobby_id) else {
            return 0;
        };

        let mut delivered = 0;
        for (id, connection) in connections {
            if Some(*id) == except {
                continue;
            }

            match connection.sender.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Dropped message for connection {}: {}", id, e),
            }
        }

        delivered
    }

    /// Number of connections registered on a lobby
    pub async fn connection_count(&self, lobby_id: i64) -> usize {
        self.lobbies
            .read()
            .await
            .get(&lobby_id)
            .map_or(0, |connections| connections.len())
    }
}

/// Kinds of events the service itself announces to a lobby
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyEventKind {
    PlayerJoined,
    PlayerLeft,
    CreatorChanged,
    PlayerReady,
    GameStarted,
    LobbyClosed,
}

/// Server-originated lobby event, shaped `{type, data, user_id, lobby_id}`
#[derive(Debug, Clone)]
pub struct LobbyEvent {
    pub kind: LobbyEventKind,
    pub data: Value,
    pub user_id: i64,
    pub lobby_id: i64,
}

impl LobbyEvent {
    pub fn new(kind: LobbyEventKind, lobby_id: i64, user_id: i64, data: Value) -> Self {
        Self {
            kind,
            data,
            user_id,
            lobby_id,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "type": self.kind,
            "data": self.data,
            "user_id": self.user_id,
            "lobby_id": self.lobby_id,
        })
    }
}
