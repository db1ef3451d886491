//! JWT service for session token issuing and validation
//!
//! Tokens are HS256-signed with a shared secret and carry the username as
//! subject together with an absolute expiry.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shortest secret accepted for HS256 signing
const MIN_SECRET_LEN: usize = 32;

/// Longest token lifetime accepted from configuration (30 days)
pub const MAX_TOKEN_TTL: u64 = 30 * 24 * 60 * 60;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Shared secret used to sign and verify tokens
    pub secret: String,
    /// Token lifetime in seconds (default: 1 hour)
    pub token_ttl: u64,
}

impl JwtConfig {
    /// Create a new JwtConfig from environment variables
    ///
    /// # Environment Variables
    /// - `JWT_SECRET`: Shared signing secret, at least 32 bytes (required)
    /// - `JWT_TOKEN_TTL`: Token lifetime in seconds (default: 3600)
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable not set"))?;

        let token_ttl = match std::env::var("JWT_TOKEN_TTL") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| anyhow::anyhow!("JWT_TOKEN_TTL is not a valid number: {}", raw))?,
            Err(_) => 3600,
        };

        let config = JwtConfig { secret, token_ttl };
        config.validate()?;
        Ok(config)
    }

    /// Reject secrets that are too short and lifetimes outside `1..=MAX_TOKEN_TTL`
    pub fn validate(&self) -> Result<()> {
        if self.secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {} bytes long", MIN_SECRET_LEN);
        }

        if self.token_ttl == 0 || self.token_ttl > MAX_TOKEN_TTL {
            anyhow::bail!(
                "JWT_TOKEN_TTL must be between 1 and {} seconds, got {}",
                MAX_TOKEN_TTL,
                self.token_ttl
            );
        }

        Ok(())
    }
}

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username of the token holder
    pub sub: String,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Reasons a token is refused
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),

    #[error("system clock error: {0}")]
    Clock(#[from] std::time::SystemTimeError),
}

/// JWT service
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    config: JwtConfig,
}

impl JwtService {
    /// Initialize a new JWT service
    pub fn new(config: JwtConfig) -> Result<Self> {
        config.validate()?;

        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(JwtService {
            encoding_key,
            decoding_key,
            validation,
            config,
        })
    }

    /// Issue a token for `subject` with the configured lifetime
    pub fn issue_token(&self, subject: &str) -> Result<String, TokenError> {
        self.issue_token_with_ttl(subject, self.config.token_ttl)
    }

    /// Issue a token for `subject` that expires `ttl` seconds from now
    pub fn issue_token_with_ttl(&self, subject: &str, ttl: u64) -> Result<String, TokenError> {
        let now = unix_now()?;

        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp: now + ttl,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;
        Ok(token)
    }

    /// Validate a token and return the claims
    ///
    /// A token is valid strictly before its `exp` second.
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e),
            })?;

        if token_data.claims.exp <= unix_now()? {
            return Err(TokenError::Expired);
        }

        Ok(token_data.claims)
    }
}

fn unix_now() -> Result<u64, TokenError> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs())
}
