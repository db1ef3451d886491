//! Input validation utilities

use regex::Regex;
use std::sync::OnceLock;

/// Smallest and largest lobby capacity accepted on creation
pub const MIN_LOBBY_PLAYERS: i32 = 2;
pub const MAX_LOBBY_PLAYERS: i32 = 8;

/// Validate username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    if username.len() < 3 {
        return Err("Username must be at least 3 characters long".to_string());
    }

    if username.len() > 32 {
        return Err("Username must be at most 32 characters long".to_string());
    }

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("Failed to compile username regex"));

    if !regex.is_match(username) {
        return Err("Username can only contain letters, numbers, and underscores".to_string());
    }

    Ok(())
}

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    let length = password.chars().count();

    if length < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if length > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    Ok(())
}

/// Validate a lobby name, returning it trimmed
pub fn validate_lobby_name(name: &str) -> Result<String, String> {
    let name = name.trim();

    if name.is_empty() {
        return Err("Lobby name is required".to_string());
    }

    if name.chars().count() > 100 {
        return Err("Lobby name must be at most 100 characters long".to_string());
    }

    Ok(name.to_string())
}

/// Validate lobby capacity
pub fn validate_max_players(max_players: i32) -> Result<(), String> {
    if !(MIN_LOBBY_PLAYERS..=MAX_LOBBY_PLAYERS).contains(&max_players) {
        return Err(format!(
            "max_players must be between {} and {}",
            MIN_LOBBY_PLAYERS, MAX_LOBBY_PLAYERS
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usernames() {
        assert!(validate_username("captain_nemo").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username(&"x".repeat(33)).is_err());
    }

    #[test]
    fn test_emails() {
        assert!(validate_email("nemo@nautilus.sea").is_ok());
        assert!(validate_email("nemo@").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_passwords() {
        assert!(validate_password("torpedo1").is_ok());
        assert!(validate_password("short").is_err());
        assert!(validate_password(&"p".repeat(129)).is_err());
    }

    #[test]
    fn test_password_length_counts_characters() {
        // 2 bytes per char in UTF-8
        assert!(validate_password(&"я".repeat(100)).is_ok());
        assert!(validate_password(&"я".repeat(128)).is_ok());
        assert!(validate_password(&"я".repeat(129)).is_err());
        assert!(validate_password("яяяя").is_err());
    }

    #[test]
    fn test_lobby_name_is_trimmed() {
        assert_eq!(validate_lobby_name("  Midway  ").unwrap(), "Midway");
        assert!(validate_lobby_name("   ").is_err());
        assert!(validate_lobby_name(&"n".repeat(101)).is_err());
    }

    #[test]
    fn test_max_players_bounds() {
        assert!(validate_max_players(1).is_err());
        assert!(validate_max_players(2).is_ok());
        assert!(validate_max_players(8).is_ok());
        assert!(validate_max_players(9).is_err());
    }
}
