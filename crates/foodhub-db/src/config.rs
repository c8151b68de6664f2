//! Database configuration.
//!
//! Built in code with the `DbConfig` builder, or loaded from environment
//! variables with fallback to defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Database configuration.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use foodhub_db::DbConfig;
///
/// let config = DbConfig::new("./foodhub.db")
///     .max_connections(8)
///     .query_timeout(Duration::from_secs(5));
/// assert_eq!(config.max_connections, 8);
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Maximum number of connections in the pool.
    /// Default: 5
    pub max_connections: u32,

    /// Minimum number of connections to keep alive.
    /// Default: 1
    pub min_connections: u32,

    /// How long to wait for a pooled connection.
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Idle timeout before closing a connection.
    /// Default: 10 minutes
    pub idle_timeout: Duration,

    /// How long SQLite waits on a locked database before giving up.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Deadline for each repository call.
    /// Default: 3 seconds
    pub query_timeout: Duration,

    /// Whether to run migrations on connect.
    /// Default: true
    pub run_migrations: bool,
}

impl DbConfig {
    /// Creates a new database configuration with the given path.
    ///
    /// The file is created on connect if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            busy_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(3),
            run_migrations: true,
        }
    }

    /// Sets the maximum number of connections.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the minimum number of connections.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Sets the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets how long a connection waits on a locked database.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Sets the per-call deadline.
    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Sets whether to run migrations on connect.
    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    /// Creates an in-memory database configuration (for testing).
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let db = Database::new(DbConfig::in_memory()).await?;
    /// // Database is isolated, perfect for tests
    /// ```
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(":memory:"),
            max_connections: 1, // In-memory requires single connection
            min_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(60),
            busy_timeout: Duration::from_secs(5),
            query_timeout: Duration::from_secs(3),
            run_migrations: true,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// | Variable                        | Default            |
    /// |---------------------------------|--------------------|
    /// | `FOODHUB_DATABASE_PATH`         | `./foodhub.db`     |
    /// | `FOODHUB_DB_MAX_CONNECTIONS`    | `5`                |
    /// | `FOODHUB_DB_QUERY_TIMEOUT_SECS` | `3`                |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let path = lookup("FOODHUB_DATABASE_PATH").unwrap_or_else(|| "./foodhub.db".to_string());
        if path.trim().is_empty() {
            return Err(ConfigError::MissingRequired(
                "FOODHUB_DATABASE_PATH".to_string(),
            ));
        }

        let max_connections: u32 = lookup("FOODHUB_DB_MAX_CONNECTIONS")
            .unwrap_or_else(|| "5".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("FOODHUB_DB_MAX_CONNECTIONS".to_string()))?;

        let query_timeout_secs: u64 = lookup("FOODHUB_DB_QUERY_TIMEOUT_SECS")
            .unwrap_or_else(|| "3".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("FOODHUB_DB_QUERY_TIMEOUT_SECS".to_string()))?;

        if max_connections == 0 {
            return Err(ConfigError::InvalidValue(
                "FOODHUB_DB_MAX_CONNECTIONS".to_string(),
            ));
        }

        Ok(DbConfig::new(path)
            .max_connections(max_connections)
            .min_connections(1)
            .query_timeout(Duration::from_secs(query_timeout_secs)))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
