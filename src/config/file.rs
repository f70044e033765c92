use secrecy::SecretString;
use serde::Deserialize;
use std::{collections::HashSet, fs, path::Path, time::Duration};

use super::{ConfigError, types::de_duration};

// -----------------------------------------------------------------------------
// ----- Defaults --------------------------------------------------------------

const DEFAULT_POOL_SIZE: usize = 5;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

// -----------------------------------------------------------------------------
// ----- FileConfig ------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FileConfig {
    pub heartbeat_interval: Duration,
    pub postgres: PostgresSettings,
    pub redis: RedisSettings,
    pub chat_servers: Vec<ChatServerEntry>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let doc: ConfigFile = toml::from_str(raw).map_err(|e| ConfigError::Toml { source: e })?;

        if doc.heartbeat_interval.is_zero() {
            return Err(ConfigError::InvalidField("heartbeat_interval".into()));
        }

        if doc.chat_servers.is_empty() {
            return Err(ConfigError::NoChatServers);
        }

        let mut seen = HashSet::with_capacity(doc.chat_servers.len());
        let mut chat_servers = Vec::with_capacity(doc.chat_servers.len());
        for entry in doc.chat_servers {
            non_empty(&entry.name, "chat_servers.name")?;
            non_empty(&entry.host, "chat_servers.host")?;
            non_empty(&entry.port, "chat_servers.port")?;

            if !seen.insert(entry.name.clone()) {
                return Err(ConfigError::DuplicateChatServer { name: entry.name });
            }

            chat_servers.push(ChatServerEntry {
                name: entry.name,
                host: entry.host,
                port: entry.port,
            });
        }

        Ok(Self {
            heartbeat_interval: doc.heartbeat_interval,
            postgres: doc.postgres.try_into()?,
            redis: doc.redis.try_into()?,
            chat_servers,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- In-memory records -----------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub pool_size: usize,
    pub acquire_timeout: Duration,
    pub sweep_interval: Duration,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: SecretString,
    pub database: String,
    pub pool: PoolSettings,
}

#[derive(Debug, Clone)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub password: Option<SecretString>,
    pub pool: PoolSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatServerEntry {
    pub name: String,
    pub host: String,
    pub port: String,
}

// -----------------------------------------------------------------------------
// ----- Internal: On-disk format ----------------------------------------------

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default = "default_heartbeat", deserialize_with = "de_duration")]
    heartbeat_interval: Duration,

    postgres: PostgresFileEntry,
    redis: RedisFileEntry,

    #[serde(default)]
    chat_servers: Vec<ChatServerFileEntry>,
}

#[derive(Debug, Deserialize)]
struct PostgresFileEntry {
    host: String,
    port: u16,
    user: String,
    password: String,
    #[serde(alias = "schema")]
    database: String,

    #[serde(default = "default_pool_size")]
    pool_size: usize,
    #[serde(default = "default_acquire_timeout", deserialize_with = "de_duration")]
    acquire_timeout: Duration,
    #[serde(default = "default_sweep_interval", deserialize_with = "de_duration")]
    sweep_interval: Duration,
    #[serde(default = "default_connect_timeout", deserialize_with = "de_duration")]
    connect_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct RedisFileEntry {
    host: String,
    port: u16,
    #[serde(default)]
    password: Option<String>,

    #[serde(default = "default_pool_size")]
    pool_size: usize,
    #[serde(default = "default_acquire_timeout", deserialize_with = "de_duration")]
    acquire_timeout: Duration,
    #[serde(default = "default_sweep_interval", deserialize_with = "de_duration")]
    sweep_interval: Duration,
    #[serde(default = "default_connect_timeout", deserialize_with = "de_duration")]
    connect_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ChatServerFileEntry {
    name: String,
    host: String,
    port: String,
}

impl TryFrom<PostgresFileEntry> for PostgresSettings {
    type Error = ConfigError;

    fn try_from(e: PostgresFileEntry) -> Result<Self, ConfigError> {
        non_empty(&e.host, "postgres.host")?;
        non_empty(&e.user, "postgres.user")?;
        non_empty(&e.database, "postgres.database")?;

        Ok(Self {
            host: e.host,
            port: e.port,
            user: e.user,
            password: SecretString::new(e.password.into_boxed_str()),
            database: e.database,
            pool: pool_settings(
                "postgres",
                e.pool_size,
                e.acquire_timeout,
                e.sweep_interval,
                e.connect_timeout,
            )?,
        })
    }
}

impl TryFrom<RedisFileEntry> for RedisSettings {
    type Error = ConfigError;

    fn try_from(e: RedisFileEntry) -> Result<Self, ConfigError> {
        non_empty(&e.host, "redis.host")?;

        Ok(Self {
            host: e.host,
            port: e.port,
            password: e
                .password
                .filter(|p| !p.is_empty())
                .map(|p| SecretString::new(p.into_boxed_str())),
            pool: pool_settings(
                "redis",
                e.pool_size,
                e.acquire_timeout,
                e.sweep_interval,
                e.connect_timeout,
            )?,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Helpers -----------------------------------------------------

fn pool_settings(
    section: &str,
    pool_size: usize,
    acquire_timeout: Duration,
    sweep_interval: Duration,
    connect_timeout: Duration,
) -> Result<PoolSettings, ConfigError> {
    if pool_size == 0 {
        return Err(ConfigError::InvalidField(format!("{section}.pool_size")));
    }
    if sweep_interval.is_zero() {
        return Err(ConfigError::InvalidField(format!("{section}.sweep_interval")));
    }
    if connect_timeout.is_zero() {
        return Err(ConfigError::InvalidField(format!("{section}.connect_timeout")));
    }

    Ok(PoolSettings {
        pool_size,
        acquire_timeout,
        sweep_interval,
        connect_timeout,
    })
}

fn non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidField(field.into()));
    }
    Ok(())
}

fn default_pool_size() -> usize {
    DEFAULT_POOL_SIZE
}

fn default_acquire_timeout() -> Duration {
    DEFAULT_ACQUIRE_TIMEOUT
}

fn default_sweep_interval() -> Duration {
    DEFAULT_SWEEP_INTERVAL
}

fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

fn default_heartbeat() -> Duration {
    DEFAULT_HEARTBEAT_INTERVAL
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
