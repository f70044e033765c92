use postgres::{Client, Config as PgConfig, NoTls};
use secrecy::ExposeSecret;
use std::fmt;

use super::BackendError;
use crate::config::PostgresSettings;
use crate::pool::Connector;

// -----------------------------------------------------------------------------
// ----- PostgresConnector -----------------------------------------------------

/// Relational-store flavor of the pool.
///
/// `postgres::Client` drives its own single-threaded runtime, so connections
/// must be used from plain threads (or `spawn_blocking`), never directly from
/// async code.
pub struct PostgresConnector {
    config: PgConfig,
    target: String,
}

impl PostgresConnector {
    pub fn new(settings: &PostgresSettings) -> Self {
        let mut config = PgConfig::new();
        config
            .host(&settings.host)
            .port(settings.port)
            .user(&settings.user)
            .password(settings.password.expose_secret())
            .dbname(&settings.database)
            .connect_timeout(settings.pool.connect_timeout)
            .application_name("chatstatus");

        Self {
            config,
            target: format!(
                "{}@{}:{}/{}",
                settings.user, settings.host, settings.port, settings.database
            ),
        }
    }
}

impl Connector for PostgresConnector {
    type Connection = Client;
    type Error = BackendError;

    fn connect(&self) -> Result<Client, BackendError> {
        Ok(self.config.connect(NoTls)?)
    }

    fn is_alive(&self, client: &mut Client) -> Result<(), BackendError> {
        client.simple_query("SELECT 1")?;
        Ok(())
    }
}

impl fmt::Debug for PostgresConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConnector")
            .field("target", &self.target)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
