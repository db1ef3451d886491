//! Common library for the Sea Battle backend
//!
//! This crate provides shared functionality used across services:
//! PostgreSQL connectivity, embedded schema migrations and the database
//! error taxonomy.

pub mod database;
pub mod error;

/// Example usage of the database module
///
/// ```rust,no_run
/// use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig::from_env()?;
///     let pool = init_pool(&config).await?;
///     println!("Database health check: {}", health_check(&pool).await);
///     run_migrations(&pool).await?;
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
