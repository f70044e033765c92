use std::net::SocketAddr;
use thiserror::Error;

use crate::config::ConfigError;
use crate::executor::ExecutorError;
use crate::gateway::GatewayError;
use crate::store::StoreError;

// -----------------------------------------------------------------------------
// ----- StartupError ----------------------------------------------------------

/// Anything that stops the process from coming up. Once serving, errors are
/// reported per request instead.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("stores: {0}")]
    Store(#[from] StoreError),

    #[error("execution contexts: {0}")]
    Executor(#[from] ExecutorError),

    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),

    #[error("failed to build listener runtime: {0}")]
    Runtime(std::io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
