//! Game model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A match played out of a started lobby
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Game {
    pub id: i64,
    pub lobby_id: i64,
    pub current_turn: i32,
    pub is_finished: bool,
    pub winner_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Response for starting a game
#[derive(Debug, Serialize)]
pub struct GameStartResponse {
    pub message: String,
    pub game_id: i64,
    /// 1-based position of the caller in lobby join order
    pub player_number: usize,
}
