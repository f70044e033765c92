//! Connectors for the two backing stores. Query logic lives with the callers;
//! this module only knows how to open a connection and prove it is alive.

pub mod postgres;
pub mod redis;

use thiserror::Error;

pub use self::postgres::PostgresConnector;
pub use self::redis::RedisConnector;

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("postgres: {0}")]
    Postgres(#[from] ::postgres::Error),

    #[error("redis: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("unexpected reply to {command}: {reply:?}")]
    UnexpectedReply { command: &'static str, reply: String },
}
