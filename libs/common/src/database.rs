//! Database module for handling PostgreSQL connections and operations
//!
//! This module provides connection pooling, configuration, and health checks
//! for the PostgreSQL database.

use crate::error::{DatabaseError, DatabaseResult};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{PgPool, Pool, Postgres};
use std::env;
use std::time::Duration;
use tracing::{error, info};

/// Database configuration struct
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Full connection URL; takes precedence over the individual parts
    pub database_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    /// TLS mode (`disable`, `prefer`, `require`, `verify-ca`, `verify-full`)
    pub ssl_mode: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Connection acquire timeout in seconds
    pub connection_timeout: u64,
}

impl DatabaseConfig {
    /// Create a new DatabaseConfig from environment variables
    ///
    /// # Environment Variables
    /// - `DATABASE_URL`: PostgreSQL connection URL (optional)
    /// - `DB_HOST` (default: localhost), `DB_PORT` (default: 5432)
    /// - `DB_USER` (default: postgres), `DB_PASSWORD` (default: empty)
    /// - `DB_DATABASE` (default: advising)
    /// - `DB_SSL_MODE` (default: prefer)
    /// - `DB_POOL_SIZE`: Maximum number of connections (default: 10)
    /// - `DB_CONNECTION_TIMEOUT`: Acquire timeout in seconds (default: 30)
    pub fn from_env() -> DatabaseResult<Self> {
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.is_empty());

        let port = match env::var("DB_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| DatabaseError::Configuration(format!("Invalid DB_PORT: {}", raw)))?,
            Err(_) => 5432,
        };

        let max_connections = env::var("DB_POOL_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let connection_timeout = env::var("DB_CONNECTION_TIMEOUT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            database_url,
            host: env::var("DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port,
            username: env::var("DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: env::var("DB_PASSWORD").unwrap_or_default(),
            database: env::var("DB_DATABASE").unwrap_or_else(|_| "advising".to_string()),
            ssl_mode: env::var("DB_SSL_MODE").unwrap_or_else(|_| "prefer".to_string()),
            max_connections,
            connection_timeout,
        })
    }

    /// Build the connection options described by this configuration
    pub fn connect_options(&self) -> DatabaseResult<PgConnectOptions> {
        let ssl_mode: PgSslMode = self.ssl_mode.parse().map_err(|e| {
            DatabaseError::Configuration(format!("Invalid TLS mode {}: {}", self.ssl_mode, e))
        })?;

        let options = match &self.database_url {
            Some(url) => url
                .parse::<PgConnectOptions>()
                .map_err(|e| DatabaseError::Configuration(format!("Invalid database URL: {}", e)))?,
            None => PgConnectOptions::new()
                .host(&self.host)
                .port(self.port)
                .username(&self.username)
                .password(&self.password)
                .database(&self.database),
        };

        Ok(options.ssl_mode(ssl_mode))
    }
}

/// Initialize a PostgreSQL connection pool
///
/// # Arguments
///
/// * `config` - Database configuration
///
/// # Returns
///
/// * `DatabaseResult<Pool<Postgres>>` - PostgreSQL connection pool or error
pub async fn init_pool(config: &DatabaseConfig) -> DatabaseResult<Pool<Postgres>> {
    info!("Initializing database connection pool");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout))
        .connect_with(config.connect_options()?)
        .await
        .map_err(DatabaseError::Connection)?;

    info!(
        "Database connection pool initialized (max {} connections)",
        config.max_connections
    );
    Ok(pool)
}

/// Check database connectivity
///
/// # Arguments
///
/// * `pool` - PostgreSQL connection pool
///
/// # Returns
///
/// * `DatabaseResult<bool>` - True if connection is successful, false otherwise
pub async fn health_check(pool: &PgPool) -> DatabaseResult<bool> {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => Ok(true),
        Err(e) => {
            error!("Database health check failed: {}", e);
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 9] = [
        "DATABASE_URL",
        "DB_HOST",
        "DB_PORT",
        "DB_USER",
        "DB_PASSWORD",
        "DB_DATABASE",
        "DB_SSL_MODE",
        "DB_POOL_SIZE",
        "DB_CONNECTION_TIMEOUT",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_database_config_defaults() {
        clear_env();

        let config = DatabaseConfig::from_env().expect("Failed to create database config");
        assert_eq!(config.database_url, None);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 5432);
        assert_eq!(config.database, "advising");
        assert_eq!(config.ssl_mode, "prefer");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.connection_timeout, 30);
        assert!(config.connect_options().is_ok());
    }

    #[test]
    #[serial]
    fn test_database_config_from_parts() {
        clear_env();
        unsafe {
            env::set_var("DB_HOST", "db.internal");
            env::set_var("DB_PORT", "6543");
            env::set_var("DB_USER", "advisor");
            env::set_var("DB_SSL_MODE", "require");
            env::set_var("DB_POOL_SIZE", "4");
        }

        let config = DatabaseConfig::from_env().unwrap();
        assert_eq!(config.host, "db.internal");
        assert_eq!(config.port, 6543);
        assert_eq!(config.username, "advisor");
        assert_eq!(config.max_connections, 4);
        assert!(config.connect_options().is_ok());

        clear_env();
    }

    #[test]
    #[serial]
    fn test_database_config_rejects_bad_port() {
        clear_env();
        unsafe {
            env::set_var("DB_PORT", "not-a-port");
        }

        assert!(matches!(
            DatabaseConfig::from_env(),
            Err(DatabaseError::Configuration(_))
        ));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_ssl_mode() {
        clear_env();
        unsafe {
            env::set_var("DB_SSL_MODE", "sometimes");
        }

        let config = DatabaseConfig::from_env().unwrap();
        assert!(matches!(
            config.connect_options(),
            Err(DatabaseError::Configuration(_))
        ));

        clear_env();
    }
}
