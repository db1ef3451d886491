//! Lobby service models

pub mod game;
pub mod lobby;
pub mod player;
pub mod user;

// Re-export for convenience
pub use game::{Game, GameStartResponse};
pub use lobby::{LeavePlan, Lobby, LobbyDetail, LobbyResponse, LobbyStatus, NewLobby};
pub use player::{Player, ReadyRequest};
pub use user::{LoginCredentials, NewUser, TokenResponse, User, UserResponse, UserWithOnline};
