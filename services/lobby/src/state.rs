//! Application state shared across handlers

use chrono::Duration;
use sqlx::PgPool;

use crate::auth::AuthService;
use crate::broadcast::BroadcastRegistry;
use crate::config::ServerConfig;
use crate::jwt::JwtService;
use crate::presence::PresenceTracker;
use crate::repositories::{LobbyRepository, UserRepository};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub auth: AuthService,
    pub lobby_repository: LobbyRepository,
    pub presence: PresenceTracker,
    pub broadcast: BroadcastRegistry,
}

impl AppState {
    pub fn new(db_pool: PgPool, jwt: JwtService, config: &ServerConfig) -> Self {
        let users = UserRepository::new(db_pool.clone());

        Self {
            auth: AuthService::new(users.clone(), jwt),
            lobby_repository: LobbyRepository::new(db_pool.clone()),
            presence: PresenceTracker::new(
                users,
                Duration::seconds(config.presence_threshold_seconds),
            ),
            broadcast: BroadcastRegistry::new(),
            db_pool,
        }
    }
}
