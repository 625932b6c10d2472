//! Database connection pool management.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info, warn};

use scribe_core::defaults;
use scribe_core::{Error, Result};

/// Pool sizing.
///
/// Each worker holds a connection for the whole of a batch recount
/// transaction, so the pool is sized from the worker count plus
/// [`defaults::DB_POOL_HEADROOM`] for request handlers and webhook lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::for_workers(defaults::WORKER_COUNT)
    }
}

impl PoolConfig {
    /// Size the pool for `worker_count` concurrent workers.
    pub fn for_workers(worker_count: usize) -> Self {
        let workers = u32::try_from(worker_count).unwrap_or(u32::MAX);
        Self {
            max_connections: workers.saturating_add(defaults::DB_POOL_HEADROOM),
            acquire_timeout: Duration::from_secs(defaults::DB_ACQUIRE_TIMEOUT_SECS),
        }
    }

    /// Size the pool for `worker_count`, then apply environment overrides.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `DB_MAX_CONNECTIONS` | workers + 6 |
    /// | `DB_ACQUIRE_TIMEOUT_SECS` | 30 |
    ///
    /// An override below the worker count is raised to it, with a warning.
    pub fn from_env(worker_count: usize) -> Self {
        Self::from_lookup(worker_count, |key| std::env::var(key).ok())
    }

    fn from_lookup(worker_count: usize, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::for_workers(worker_count);
        if let Some(n) = lookup("DB_MAX_CONNECTIONS").and_then(|v| v.parse::<u32>().ok()) {
            config.max_connections = n;
        }
        if let Some(secs) = lookup("DB_ACQUIRE_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            config.acquire_timeout = Duration::from_secs(secs);
        }

        let floor = u32::try_from(worker_count).unwrap_or(u32::MAX).max(1);
        if config.max_connections < floor {
            warn!(
                subsystem = "db",
                component = "pool",
                requested = config.max_connections,
                worker_count,
                "DB_MAX_CONNECTIONS below worker count, raising it"
            );
            config.max_connections = floor;
        }
        config
    }

    pub fn with_max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }
}

/// Open a PostgreSQL pool with the given sizing.
pub async fn create_pool(database_url: &str, config: &PoolConfig) -> Result<PgPool> {
    let start = Instant::now();

    info!(
        subsystem = "db",
        component = "pool",
        op = "create",
        max_connections = config.max_connections,
        acquire_timeout_secs = config.acquire_timeout.as_secs(),
        "Creating database connection pool"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        op = "established",
        pool_size = pool.size(),
        pool_idle = pool.num_idle(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Database connection pool established"
    );
    Ok(pool)
}

/// Log current pool health metrics.
pub fn log_pool_metrics(pool: &PgPool) {
    let size = pool.size();
    let idle = pool.num_idle();

    debug!(
        subsystem = "db",
        component = "pool",
        op = "metrics",
        pool_size = size,
        pool_idle = idle,
        "Pool health check"
    );

    if idle == 0 && size > 0 {
        warn!(
            subsystem = "db",
            component = "pool",
            pool_size = size,
            "Connection pool has no idle connections, potential exhaustion"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_pool_sized_from_worker_count() {
        let config = PoolConfig::for_workers(8);
        assert_eq!(config.max_connections, 8 + defaults::DB_POOL_HEADROOM);
        assert_eq!(
            config.acquire_timeout,
            Duration::from_secs(defaults::DB_ACQUIRE_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_default_follows_default_worker_count() {
        assert_eq!(
            PoolConfig::default(),
            PoolConfig::for_workers(defaults::WORKER_COUNT)
        );
    }

    #[test]
    fn test_env_overrides_sizing() {
        let config = PoolConfig::from_lookup(
            4,
            lookup(&[("DB_MAX_CONNECTIONS", "25"), ("DB_ACQUIRE_TIMEOUT_SECS", "5")]),
        );
        assert_eq!(config.max_connections, 25);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_override_below_worker_count_is_raised() {
        let config = PoolConfig::from_lookup(12, lookup(&[("DB_MAX_CONNECTIONS", "3")]));
        assert_eq!(config.max_connections, 12);
    }

    #[test]
    fn test_unparsable_override_is_ignored() {
        let config = PoolConfig::from_lookup(2, lookup(&[("DB_MAX_CONNECTIONS", "many")]));
        assert_eq!(config, PoolConfig::for_workers(2));
    }

    #[test]
    fn test_zero_workers_still_gets_a_connection() {
        let config = PoolConfig::from_lookup(0, lookup(&[("DB_MAX_CONNECTIONS", "0")]));
        assert_eq!(config.max_connections, 1);
    }
}
