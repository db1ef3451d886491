//! Service configuration

use anyhow::Result;

/// HTTP listener and presence settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the HTTP server binds to
    pub bind_address: String,
    /// Seconds since last activity during which a user still counts as online
    pub presence_threshold_seconds: i64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            presence_threshold_seconds: 300,
        }
    }
}

impl ServerConfig {
    /// Create a new ServerConfig from environment variables
    ///
    /// # Environment Variables
    /// - `BIND_ADDRESS`: Listen address (default: "0.0.0.0:8000")
    /// - `PRESENCE_THRESHOLD_SECONDS`: Online threshold in seconds (default: 300)
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let bind_address = std::env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address);

        let presence_threshold_seconds = match std::env::var("PRESENCE_THRESHOLD_SECONDS") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                anyhow::anyhow!("PRESENCE_THRESHOLD_SECONDS is not a valid number: {}", raw)
            })?,
            Err(_) => defaults.presence_threshold_seconds,
        };

        if presence_threshold_seconds <= 0 {
            anyhow::bail!(
                "PRESENCE_THRESHOLD_SECONDS must be positive, got {}",
                presence_threshold_seconds
            );
        }

        Ok(ServerConfig {
            bind_address,
            presence_threshold_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_server_config_defaults() {
        unsafe {
            std::env::remove_var("BIND_ADDRESS");
            std::env::remove_var("PRESENCE_THRESHOLD_SECONDS");
        }

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8000");
        assert_eq!(config.presence_threshold_seconds, 300);
    }

    #[test]
    #[serial]
    fn test_server_config_rejects_non_positive_threshold() {
        unsafe {
            std::env::set_var("PRESENCE_THRESHOLD_SECONDS", "0");
        }
        assert!(ServerConfig::from_env().is_err());

        unsafe {
            std::env::set_var("PRESENCE_THRESHOLD_SECONDS", "five minutes");
        }
        assert!(ServerConfig::from_env().is_err());

        unsafe {
            std::env::set_var("BIND_ADDRESS", "127.0.0.1:9000");
            std::env::set_var("PRESENCE_THRESHOLD_SECONDS", "60");
        }
        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.presence_threshold_seconds, 60);

        unsafe {
            std::env::remove_var("BIND_ADDRESS");
            std::env::remove_var("PRESENCE_THRESHOLD_SECONDS");
        }
    }
}
