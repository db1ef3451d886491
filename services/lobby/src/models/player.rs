//! Lobby membership model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Membership of a user in a lobby
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Player {
    pub id: i64,
    pub user_id: i64,
    pub lobby_id: i64,
    pub is_ready: bool,
    pub joined_at: DateTime<Utc>,
}

/// Ready toggle payload
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyRequest {
    pub is_ready: bool,
}
