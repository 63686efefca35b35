//! Configuration for the ingestion pipeline

use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

// ============================================================================
// Ingestion Configuration Constants
// ============================================================================

/// Default number of canonical records per flushed batch.
pub const DEFAULT_BATCH_CAPACITY: usize = 1000;

/// Upper bound on the batch capacity. One multi-row INSERT binds
/// `columns x rows` parameters and PostgreSQL caps a statement at 65,535
/// binds; 5,000 rows leaves ample headroom for the destination's column
/// count.
pub const MAX_BATCH_CAPACITY: usize = 5000;

/// Default persistence interval for the progress counter, in rows.
pub const DEFAULT_PROGRESS_PERSIST_EVERY: u64 = 10_000;

/// Default minimum per-category transaction count for the fraud-rate report.
pub const DEFAULT_MIN_CATEGORY_COUNT: i64 = 50;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/tdp";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub database: DatabaseConfig,

    /// Records per flushed batch (capacity C).
    pub batch_capacity: usize,

    /// Capacity of the reader-to-writer channel. Defaults to the batch
    /// capacity; the reader blocks once this many records are buffered.
    pub channel_capacity: usize,

    /// Persist the progress counter every this many processed rows.
    pub progress_persist_every: u64,

    /// Minimum per-category count for the fraud-rate breakdown.
    pub min_category_count: i64,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl IngestConfig {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables: `DATABASE_URL` (or `TDP_DATABASE_URL`, which
    /// wins), `TDP_BATCH_CAPACITY`, `TDP_CHANNEL_CAPACITY`,
    /// `TDP_PROGRESS_PERSIST_EVERY`, `TDP_MIN_CATEGORY_COUNT`,
    /// `TDP_DATABASE_MAX_CONNECTIONS`, `TDP_DATABASE_CONNECT_TIMEOUT`.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let batch_capacity = env_parsed("TDP_BATCH_CAPACITY", DEFAULT_BATCH_CAPACITY);

        let config = IngestConfig {
            database: DatabaseConfig {
                url: std::env::var("TDP_DATABASE_URL")
                    .or_else(|_| std::env::var("DATABASE_URL"))
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_parsed(
                    "TDP_DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                connect_timeout_secs: env_parsed(
                    "TDP_DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
            },
            batch_capacity,
            channel_capacity: env_parsed("TDP_CHANNEL_CAPACITY", batch_capacity),
            progress_persist_every: env_parsed(
                "TDP_PROGRESS_PERSIST_EVERY",
                DEFAULT_PROGRESS_PERSIST_EVERY,
            ),
            min_category_count: env_parsed("TDP_MIN_CATEGORY_COUNT", DEFAULT_MIN_CATEGORY_COUNT),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configured limits.
    pub fn validate(&self) -> Result<()> {
        if self.batch_capacity == 0 {
            return Err(IngestError::Config(
                "batch capacity must be greater than zero".to_string(),
            ));
        }
        if self.batch_capacity > MAX_BATCH_CAPACITY {
            return Err(IngestError::Config(format!(
                "batch capacity {} exceeds the maximum of {}",
                self.batch_capacity, MAX_BATCH_CAPACITY
            )));
        }
        if self.channel_capacity == 0 {
            return Err(IngestError::Config(
                "channel capacity must be greater than zero".to_string(),
            ));
        }
        if self.progress_persist_every == 0 {
            return Err(IngestError::Config(
                "progress persistence interval must be greater than zero".to_string(),
            ));
        }
        if self.min_category_count < 1 {
            return Err(IngestError::Config(
                "minimum category count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            },
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            channel_capacity: DEFAULT_BATCH_CAPACITY,
            progress_persist_every: DEFAULT_PROGRESS_PERSIST_EVERY,
            min_category_count: DEFAULT_MIN_CATEGORY_COUNT,
        }
    }
}

fn env_parsed<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
