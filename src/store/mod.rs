use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::backend::{BackendError, PostgresConnector, RedisConnector};
use crate::config::{PoolSettings, PostgresSettings, RedisSettings};
use crate::pool::{Connector, PoolError, PoolOptions, PoolStats, PooledConnection, ResourcePool};

// -----------------------------------------------------------------------------
// ----- Stores ----------------------------------------------------------------

/// The relational and key-value pools, built once at startup and shared by
/// whatever data-access code needs them.
pub struct Stores<S: Connector = PostgresConnector, K: Connector = RedisConnector> {
    sql: ResourcePool<S>,
    kv: ResourcePool<K>,
    sql_acquire_timeout: Duration,
    kv_acquire_timeout: Duration,
}

// -----------------------------------------------------------------------------
// ----- Stores: Static --------------------------------------------------------

impl Stores {
    /// Connects both pools. Any failure here is fatal: connections already
    /// opened are closed before the error is returned.
    pub fn connect(postgres: &PostgresSettings, redis: &RedisSettings) -> Result<Self, StoreError> {
        let sql = ResourcePool::new(
            PostgresConnector::new(postgres),
            pool_options("postgres", &postgres.pool),
        )?;

        let kv = ResourcePool::new(RedisConnector::new(redis)?, pool_options("redis", &redis.pool))?;

        Ok(Self::new(
            sql,
            postgres.pool.acquire_timeout,
            kv,
            redis.pool.acquire_timeout,
        ))
    }
}

impl<S: Connector, K: Connector> Stores<S, K> {
    pub fn new(
        sql: ResourcePool<S>,
        sql_acquire_timeout: Duration,
        kv: ResourcePool<K>,
        kv_acquire_timeout: Duration,
    ) -> Self {
        info!(
            "stores ready: {} x{}, {} x{}",
            sql.name(),
            sql.capacity(),
            kv.name(),
            kv.capacity()
        );
        Self {
            sql,
            kv,
            sql_acquire_timeout,
            kv_acquire_timeout,
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Stores: Public --------------------------------------------------------

impl<S: Connector, K: Connector> Stores<S, K> {
    pub fn sql(&self) -> Result<PooledConnection<S>, PoolError> {
        self.sql.acquire(self.sql_acquire_timeout)
    }

    pub fn kv(&self) -> Result<PooledConnection<K>, PoolError> {
        self.kv.acquire(self.kv_acquire_timeout)
    }

    pub fn stats(&self) -> Vec<PoolStats> {
        vec![self.sql.stats(), self.kv.stats()]
    }

    /// Closes both pools; safe to call more than once.
    pub fn close(&self) {
        self.sql.close();
        self.kv.close();
    }

    pub fn is_closed(&self) -> bool {
        self.sql.is_closed() && self.kv.is_closed()
    }
}

impl<S: Connector, K: Connector> std::fmt::Debug for Stores<S, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stores")
            .field("sql", &self.sql)
            .field("kv", &self.kv)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn pool_options(name: &str, settings: &PoolSettings) -> PoolOptions {
    PoolOptions::new(name, settings.pool_size).with_sweep_interval(settings.sweep_interval)
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
