pub mod connector;
pub mod resource_pool;

#[cfg(test)]
pub(crate) mod testing;

pub use connector::Connector;
pub use resource_pool::{PoolError, PoolOptions, PoolStats, PooledConnection, ResourcePool};
