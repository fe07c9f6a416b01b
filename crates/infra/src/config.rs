//! Store configuration loaded from the environment.

use std::fmt;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use thiserror::Error;
use tracing::info;

use crate::store::PostgresOrderStore;

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DATABASE_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";
pub const DATABASE_ACQUIRE_TIMEOUT_SECS: &str = "DATABASE_ACQUIRE_TIMEOUT_SECS";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },

    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),
}

/// Connection settings for [`PostgresOrderStore`].
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

// The URL usually embeds credentials.
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("database_url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

impl StoreConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let database_url = get(DATABASE_URL).ok_or(ConfigError::Missing(DATABASE_URL))?;

        let max_connections = match get(DATABASE_MAX_CONNECTIONS) {
            Some(raw) => parse_positive(DATABASE_MAX_CONNECTIONS, &raw)?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let acquire_timeout_secs = match get(DATABASE_ACQUIRE_TIMEOUT_SECS) {
            Some(raw) => parse_positive(DATABASE_ACQUIRE_TIMEOUT_SECS, &raw)?,
            None => DEFAULT_ACQUIRE_TIMEOUT_SECS,
        };

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
        })
    }

    /// Open the pool and wrap it in a store.
    pub async fn connect(&self) -> Result<PostgresOrderStore, ConfigError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.database_url)
            .await
            .map_err(ConfigError::Connect)?;

        info!(
            max_connections = self.max_connections,
            "connected to order database"
        );
        Ok(PostgresOrderStore::new(pool))
    }
}

fn parse_positive<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: fmt::Display,
{
    let value: T = raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        message: e.to_string(),
    })?;
    if value <= T::default() {
        return Err(ConfigError::Invalid {
            name,
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
