//! User presence derived from last activity

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::models::{User, UserResponse, UserWithOnline};
use crate::repositories::UserRepository;

/// `last_seen` within `threshold` of `now` (inclusive) counts as online.
pub fn is_online(last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>, threshold: Duration) -> bool {
    match last_seen {
        Some(seen) => now - seen <= threshold,
        None => false,
    }
}

/// Tracks and reports user activity
#[derive(Clone)]
pub struct PresenceTracker {
    users: UserRepository,
    threshold: Duration,
}

impl PresenceTracker {
    pub fn new(users: UserRepository, threshold: Duration) -> Self {
        Self { users, threshold }
    }

    /// Mark a user as active now
    pub async fn touch(&self, user: &User) -> Result<DateTime<Utc>> {
        let now = Utc::now();
        self.users.set_last_seen(user.id, now).await?;
        debug!("User {} seen at {}", user.id, now);
        Ok(now)
    }

    pub fn is_online(&self, user: &User, now: DateTime<Utc>) -> bool {
        is_online(user.last_seen, now, self.threshold)
    }

    /// All active users with their online flag
    pub async fn list_users(&self, now: DateTime<Utc>) -> Result<Vec<UserWithOnline>> {
        let users = self.users.list_active().await?;

        Ok(users
            .iter()
            .map(|user| UserWithOnline {
                user: UserResponse::from(user),
                is_online: self.is_online(user, now),
            })
            .collect())
    }

    /// Active users seen within the threshold, most recent first
    pub async fn list_online_users(&self, now: DateTime<Utc>) -> Result<Vec<User>> {
        self.users.list_active_seen_since(now - self.threshold).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_threshold_boundaries() {
        let now = Utc::now();
        let five = Duration::minutes(5);

        assert!(is_online(Some(now), now, five));
        assert!(is_online(Some(now - five), now, five));
        assert!(!is_online(Some(now - five - Duration::seconds(1)), now, five));
        assert!(!is_online(Some(now - Duration::minutes(6)), now, five));
        assert!(!is_online(None, now, five));
    }

    #[test]
    fn test_future_activity_counts_as_online() {
        // clock skew between writers must not hide a user
        let now = Utc::now();
        assert!(is_online(
            Some(now + Duration::seconds(2)),
            now,
            Duration::minutes(5)
        ));
    }
}
