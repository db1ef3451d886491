//! Lobby model and the membership rules applied to it

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::LobbyError;
use crate::models::Player;

/// Lobby entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Lobby {
    pub id: i64,
    pub name: String,
    pub creator_id: i64,
    pub max_players: i32,
    pub current_players: i32,
    pub is_active: bool,
    pub is_game_started: bool,
    pub created_at: DateTime<Utc>,
}

/// Derived lobby state
///
/// `Open -> Full -> InProgress`, with deletion possible from any state once
/// the last player leaves. There is no way back from `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LobbyStatus {
    Open,
    Full,
    InProgress,
}

/// What the store has to do for a player leaving a lobby
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeavePlan {
    /// The leaving player was the last one, the lobby goes away
    CloseLobby,
    /// The lobby stays; `new_creator` is set when the creator left
    Stay { new_creator: Option<i64> },
}

impl Lobby {
    pub fn is_full(&self) -> bool {
        self.current_players >= self.max_players
    }

    pub fn status(&self) -> LobbyStatus {
        if self.is_game_started {
            LobbyStatus::InProgress
        } else if self.is_full() {
            LobbyStatus::Full
        } else {
            LobbyStatus::Open
        }
    }

    /// Check whether a user may join.
    ///
    /// Capacity is checked before the started flag, and both before
    /// duplicate membership; the first failing check is the one reported.
    pub fn check_join(&self, already_joined: bool) -> Result<(), LobbyError> {
        if self.is_full() {
            return Err(LobbyError::LobbyFull);
        }

        if self.is_game_started {
            return Err(LobbyError::GameAlreadyStarted);
        }

        if already_joined {
            return Err(LobbyError::AlreadyJoined);
        }

        Ok(())
    }

    /// Decide what happens when `user_id` leaves, given the current members.
    pub fn plan_leave(&self, user_id: i64, members: &[Player]) -> Result<LeavePlan, LobbyError> {
        if !members.iter().any(|p| p.user_id == user_id) {
            return Err(LobbyError::NotInLobby);
        }

        if self.current_players <= 1 {
            return Ok(LeavePlan::CloseLobby);
        }

        let new_creator = if self.creator_id == user_id {
            next_creator(members, user_id)
        } else {
            None
        };

        Ok(LeavePlan::Stay { new_creator })
    }

    /// Check whether `user_id` may start the game.
    ///
    /// Returns the caller's 1-based position in join order.
    pub fn check_start(&self, user_id: i64, members: &[Player]) -> Result<usize, LobbyError> {
        if self.creator_id != user_id {
            return Err(LobbyError::NotCreator);
        }

        if self.is_game_started {
            return Err(LobbyError::GameAlreadyStarted);
        }

        if members.len() < 2 {
            return Err(LobbyError::NotEnoughPlayers);
        }

        if members
            .iter()
            .any(|p| p.user_id != self.creator_id && !p.is_ready)
        {
            return Err(LobbyError::PlayersNotReady);
        }

        let mut ordered: Vec<&Player> = members.iter().collect();
        ordered.sort_by_key(|p| (p.joined_at, p.id));

        ordered
            .iter()
            .position(|p| p.user_id == user_id)
            .map(|index| index + 1)
            .ok_or(LobbyError::NotInLobby)
    }
}

/// Pick the member who inherits the lobby: earliest `joined_at`, then lowest id.
pub fn next_creator(members: &[Player], leaving_user: i64) -> Option<i64> {
    members
        .iter()
        .filter(|p| p.user_id != leaving_user)
        .min_by_key(|p| (p.joined_at, p.id))
        .map(|p| p.user_id)
}

fn default_max_players() -> i32 {
    2
}

/// New lobby creation payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewLobby {
    pub name: String,
    #[serde(default = "default_max_players")]
    pub max_players: i32,
}

/// Lobby with its derived status
#[derive(Debug, Clone, Serialize)]
pub struct LobbyResponse {
    #[serde(flatten)]
    pub lobby: Lobby,
    pub status: LobbyStatus,
}

impl From<Lobby> for LobbyResponse {
    fn from(lobby: Lobby) -> Self {
        let status = lobby.status();
        Self { lobby, status }
    }
}

/// Lobby with its members in join order
#[derive(Debug, Clone, Serialize)]
pub struct LobbyDetail {
    #[serde(flatten)]
    pub lobby: LobbyResponse,
    pub players: Vec<Player>,
}
