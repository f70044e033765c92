use clap::Parser;
use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
};

use super::{ConfigError, types::LogLevel};

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CliConfig {
    pub listen_addr: SocketAddr,
    pub config_file_location: PathBuf,
    pub log_level: LogLevel,
    pub workers: usize,
}

impl CliConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_args(Args::try_parse()?)
    }

    pub fn try_parse_from<I, T>(iter: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::from_args(Args::try_parse_from(iter)?)
    }
}

// -----------------------------------------------------------------------------
// ----- CliConfig: Private ----------------------------------------------------

impl CliConfig {
    fn from_args(args: Args) -> Result<Self, ConfigError> {
        let cfg = Self {
            listen_addr: SocketAddr::from((args.host, args.port)),
            config_file_location: args.config_file,
            log_level: args.log_level,
            workers: args.workers.unwrap_or_else(num_cpus::get),
        };

        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidField("--workers must be at least 1".into()));
        }
        must_exist_file(&self.config_file_location)
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "chatstatus", version, about = "Chat gateway status service")]
struct Args {
    // IPv4 or IPv6 literal (e.g., 0.0.0.0, 127.0.0.1, ::, ::1). Required via CLI or ENV.
    #[arg(long = "host", short = 'H', env = "CHATSTATUS_HOST")]
    host: IpAddr,

    // Required via CLI or ENV.
    #[arg(long = "port", short = 'p', env = "CHATSTATUS_PORT")]
    port: u16,

    // Not required via CLI or ENV (defaults to info).
    #[arg(long = "log", env = "CHATSTATUS_LOG", default_value = "info")]
    log_level: LogLevel,

    // Must exist; no defaults.
    #[arg(long = "config", env = "CHATSTATUS_CONFIG_FILE")]
    config_file: PathBuf,

    // Execution contexts; defaults to the number of CPUs.
    #[arg(long = "workers", env = "CHATSTATUS_WORKERS")]
    workers: Option<usize>,
}

// -----------------------------------------------------------------------------
// ----- Private Utils ---------------------------------------------------------

fn must_exist_file(path: &Path) -> Result<(), ConfigError> {
    let md = fs::metadata(path).map_err(|_| ConfigError::MissingFile {
        path: path.to_path_buf(),
    })?;

    if !md.is_file() {
        return Err(ConfigError::MissingFile {
            path: path.to_path_buf(),
        });
    }

    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_flags() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();

        let cli = CliConfig::try_parse_from([
            "chatstatus", "-H", "127.0.0.1", "-p", "50052", "--config", path, "--log", "debug",
            "--workers", "3",
        ])
        .unwrap();

        assert_eq!(cli.listen_addr, "127.0.0.1:50052".parse().unwrap());
        assert_eq!(cli.log_level, LogLevel::Debug);
        assert_eq!(cli.workers, 3);
    }

    #[test]
    fn rejects_missing_config_file() {
        let err = CliConfig::try_parse_from([
            "chatstatus",
            "-H",
            "::1",
            "-p",
            "50052",
            "--config",
            "/definitely/not/here.toml",
        ])
        .unwrap_err();

        assert!(matches!(err, ConfigError::MissingFile { .. }));
    }

    #[test]
    fn rejects_zero_workers() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap();

        let err = CliConfig::try_parse_from([
            "chatstatus", "-H", "0.0.0.0", "-p", "1", "--config", path, "--workers", "0",
        ])
        .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidField(_)));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
