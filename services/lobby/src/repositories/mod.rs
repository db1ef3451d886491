//! Repositories for database operations

pub mod lobby;
pub mod user;

pub use lobby::{LeaveOutcome, LobbyRepository};
pub use user::UserRepository;
