//! SQLite pool setup.
//!
//! File databases run in WAL mode with a handful of connections. In-memory
//! databases get a single connection: each pool owns a private database and
//! writes never contend on shared-cache table locks.

use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use super::DbPool;
use crate::Result;

/// Path that selects an in-memory database.
pub const MEMORY_PATH: &str = ":memory:";

/// Pool sizing and SQLite pragmas.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
    /// Page cache per connection, in KiB.
    pub cache_size_kb: i64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 8,
            acquire_timeout: Duration::from_secs(15),
            busy_timeout: Duration::from_secs(10),
            cache_size_kb: 16_000,
        }
    }
}

impl PoolConfig {
    /// Single-connection profile for in-memory databases.
    pub fn in_memory() -> Self {
        Self {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(1),
            cache_size_kb: 4_000,
        }
    }

    /// Pick the profile that suits `path`.
    pub fn for_path(path: &str) -> Self {
        if is_memory_path(path) {
            Self::in_memory()
        } else {
            Self::default()
        }
    }

    fn connect_options(&self, path: &str) -> Result<SqliteConnectOptions> {
        let mut options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .busy_timeout(self.busy_timeout)
            // Contributions and attempt counters cascade with their gift
            .foreign_keys(true)
            .pragma("cache_size", format!("-{}", self.cache_size_kb));

        if !is_memory_path(path) {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        Ok(options)
    }
}

/// True for `:memory:` and `mode=memory` URLs.
pub fn is_memory_path(path: &str) -> bool {
    path == MEMORY_PATH || path.contains("mode=memory")
}

/// Open a pool at `path` with explicit settings.
///
/// Parent directories of file databases are created on demand.
pub async fn create_pool_with_config(path: &str, config: PoolConfig) -> Result<DbPool> {
    if !is_memory_path(path) {
        let parent = std::path::Path::new(path.trim_start_matches("sqlite:")).parent();
        if let Some(dir) = parent.filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        // Keeps in-memory databases alive between queries
        .min_connections(1)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(config.connect_options(path)?)
        .await?;

    Ok(pool)
}

/// Round-trip a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Pool occupancy, reported by `/health/ready`.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStats {
    pub size: u32,
    pub idle: u32,
    pub max_connections: u32,
}

pub fn get_pool_stats(pool: &DbPool) -> PoolStats {
    PoolStats {
        size: pool.size(),
        idle: pool.num_idle() as u32,
        max_connections: pool.options().get_max_connections(),
    }
}
