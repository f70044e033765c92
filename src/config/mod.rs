pub mod cli;
#[allow(clippy::module_inception)]
pub mod config;
pub mod file;
pub mod types;

use std::path::PathBuf;
use thiserror::Error;

pub use cli::CliConfig;
pub use config::Config;
pub use file::{ChatServerEntry, FileConfig, PoolSettings, PostgresSettings, RedisSettings};
pub use types::LogLevel;

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid CLI/ENV: {0}")]
    Cli(#[from] clap::Error),

    #[error("required file missing: {path:?}")]
    MissingFile { path: PathBuf },

    #[error("read error for {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("toml parse error: {source}")]
    Toml { source: toml::de::Error },

    #[error("no [[chat_servers]] entries")]
    NoChatServers,

    #[error("duplicate [[chat_servers]] entry for '{name}'")]
    DuplicateChatServer { name: String },

    #[error("invalid or missing field '{0}'")]
    InvalidField(String),
}
