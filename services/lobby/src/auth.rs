//! Credential store and session token resolution

use tracing::{info, warn};

use crate::error::AuthError;
use crate::jwt::{JwtService, TokenError};
use crate::models::{NewUser, User};
use crate::repositories::UserRepository;
use crate::repositories::user::verify_password;
use crate::validation::{validate_email, validate_password, validate_username};

/// Authentication service tying the user store to token issuing
#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(users: UserRepository, jwt: JwtService) -> Self {
        Self { users, jwt }
    }

    /// Register a new account
    pub async fn register(&self, new_user: &NewUser) -> Result<User, AuthError> {
        validate_username(&new_user.username).map_err(AuthError::Invalid)?;
        validate_email(&new_user.email).map_err(AuthError::Invalid)?;
        validate_password(&new_user.password).map_err(AuthError::Invalid)?;

        if self.users.username_exists(&new_user.username).await? {
            return Err(AuthError::UsernameTaken);
        }

        if self.users.email_exists(&new_user.email).await? {
            return Err(AuthError::EmailTaken);
        }

        // a concurrent registration can still win the race to the unique index
        self.users
            .create(new_user)
            .await
            .map_err(|e| unique_conflict(&e).unwrap_or(AuthError::Internal(e)))
    }

    /// Check a username and password.
    ///
    /// Unknown users and wrong passwords fail the same way.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let Some(user) = self.users.find_by_username(username).await? else {
            warn!("Login attempt for unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        if !user.is_active || !verify_password(&user.hashed_password, password)? {
            warn!("Rejected login for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        info!("User {} authenticated", user.id);
        Ok(user)
    }

    /// Issue a signed token for a user with the configured lifetime
    pub fn issue_token(&self, user: &User) -> Result<String, AuthError> {
        self.jwt
            .issue_token(&user.username)
            .map_err(|e| AuthError::Internal(e.into()))
    }

    /// Verify a token and load the user it names
    pub async fn resolve_token(&self, token: &str) -> Result<User, AuthError> {
        let claims = self.jwt.validate_token(token).map_err(|e| {
            match e {
                TokenError::Expired => warn!("Rejected expired token"),
                other => warn!("Rejected token: {}", other),
            }
            AuthError::Unauthorized
        })?;

        match self.users.find_by_username(&claims.sub).await? {
            Some(user) if user.is_active => Ok(user),
            _ => Err(AuthError::Unauthorized),
        }
    }
}

fn unique_conflict(err: &anyhow::Error) -> Option<AuthError> {
    let sqlx::Error::Database(db_err) = err.downcast_ref::<sqlx::Error>()? else {
        return None;
    };

    match db_err.constraint() {
        Some("users_username_key") => Some(AuthError::UsernameTaken),
        Some("users_email_key") => Some(AuthError::EmailTaken),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::JwtConfig;
    use sqlx::PgPool;

    fn jwt() -> JwtService {
        JwtService::new(JwtConfig {
            secret: "a-test-secret-that-is-long-enough-for-hs256".to_string(),
            token_ttl: 3600,
        })
        .unwrap()
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires a PostgreSQL server at DATABASE_URL"]
    async fn test_register_authenticate_resolve(pool: PgPool) -> anyhow::Result<()> {
        let auth = AuthService::new(UserRepository::new(pool), jwt());
        let user = auth
            .register(&NewUser {
                username: "nemo".to_string(),
                email: "nemo@nautilus.sea".to_string(),
                password: "torpedo-los".to_string(),
            })
            .await?;

        assert!(matches!(
            auth.authenticate("nemo", "wrong-password").await,
            Err(AuthError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.authenticate("ahab", "torpedo-los").await,
            Err(AuthError::InvalidCredentials)
        ));

        let authenticated = auth.authenticate("nemo", "torpedo-los").await?;
        assert_eq!(authenticated.id, user.id);

        let token = auth.issue_token(&authenticated)?;
        assert_eq!(auth.resolve_token(&token).await?.id, user.id);

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires a PostgreSQL server at DATABASE_URL"]
    async fn test_duplicate_registration_and_orphaned_token(pool: PgPool) -> anyhow::Result<()> {
        let jwt = jwt();
        let auth = AuthService::new(UserRepository::new(pool), jwt.clone());
        let nemo = NewUser {
            username: "nemo".to_string(),
            email: "nemo@nautilus.sea".to_string(),
            password: "torpedo-los".to_string(),
        };
        auth.register(&nemo).await?;

        assert!(matches!(
            auth.register(&nemo).await,
            Err(AuthError::UsernameTaken)
        ));
        assert!(matches!(
            auth.register(&NewUser {
                username: "nemo2".to_string(),
                ..nemo.clone()
            })
            .await,
            Err(AuthError::EmailTaken)
        ));

        // signature is fine but nobody is called ghost
        let token = jwt.issue_token("ghost")?;
        assert!(matches!(
            auth.resolve_token(&token).await,
            Err(AuthError::Unauthorized)
        ));

        Ok(())
    }

    #[sqlx::test(migrations = "../../migrations")]
    #[ignore = "requires a PostgreSQL server at DATABASE_URL"]
    async fn test_deactivated_user_is_locked_out(pool: PgPool) -> anyhow::Result<()> {
        let auth = AuthService::new(UserRepository::new(pool.clone()), jwt());
        let user = auth
            .register(&NewUser {
                username: "ahab".to_string(),
                email: "ahab@pequod.sea".to_string(),
                password: "white-whale".to_string(),
            })
            .await?;
        let token = auth.issue_token(&user)?;
        assert_eq!(auth.resolve_token(&token).await?.id, user.id);

        sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1")
            .bind(user.id)
            .execute(&pool)
            .await?;

        assert!(matches!(
            auth.resolve_token(&token).await,
            Err(AuthError::Unauthorized)
        ));
        assert!(matches!(
            auth.authenticate("ahab", "white-whale").await,
            Err(AuthError::InvalidCredentials)
        ));

        Ok(())
    }
}
