use std::{net::SocketAddr, time::Duration};

use super::{
    ConfigError,
    cli::CliConfig,
    file::{ChatServerEntry, FileConfig, PostgresSettings, RedisSettings},
    types::LogLevel,
};

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

/// Everything the process needs, loaded once at startup and handed to the
/// components that need it.
#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: LogLevel,
    pub workers: usize,
    pub heartbeat_interval: Duration,
    pub postgres: PostgresSettings,
    pub redis: RedisSettings,
    pub chat_servers: Vec<ChatServerEntry>,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    /// Parses CLI/ENV, then reads the file they point at.
    pub fn load() -> Result<Config, ConfigError> {
        let cli = CliConfig::from_env()?;
        let file = FileConfig::from_file(&cli.config_file_location)?;
        Ok(Self::from_parts(cli, file))
    }

    pub fn from_parts(cli: CliConfig, file: FileConfig) -> Config {
        Config {
            listen_addr: cli.listen_addr,
            log_level: cli.log_level,
            workers: cli.workers,
            heartbeat_interval: file.heartbeat_interval,
            postgres: file.postgres,
            redis: file.redis,
            chat_servers: file.chat_servers,
        }
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
