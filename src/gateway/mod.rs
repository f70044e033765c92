pub mod registry;
pub mod tokens;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::ChatServerEntry;

pub use registry::{ChatServer, ServerRegistry};
pub use tokens::{SessionToken, TokenStore, generate_token};

pub type Uid = i32;

// -----------------------------------------------------------------------------
// ----- Gateway ---------------------------------------------------------------

/// Picks chat servers and issues the session tokens clients present on login.
///
/// The registry lock and the token lock are never held at the same time.
#[derive(Debug, Default)]
pub struct Gateway {
    registry: ServerRegistry,
    tokens: TokenStore,
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub server: ChatServer,
    pub token: String,
}

// -----------------------------------------------------------------------------
// ----- Gateway: Static -------------------------------------------------------

impl Gateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: &[ChatServerEntry]) -> Result<Self, GatewayError> {
        let gateway = Self::new();
        for entry in entries {
            gateway
                .registry
                .register(&entry.name, &entry.host, &entry.port)?;
        }

        info!("gateway ready with {} chat servers", gateway.registry.len());
        Ok(gateway)
    }
}

// -----------------------------------------------------------------------------
// ----- Gateway: Public -------------------------------------------------------

impl Gateway {
    pub fn registry(&self) -> &ServerRegistry {
        &self.registry
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Assigns the least-loaded server to `uid` and binds a fresh token.
    pub fn issue_and_bind(&self, uid: Uid) -> Result<Assignment, GatewayError> {
        let server = self.registry.select()?;

        let token = generate_token();
        if self.tokens.bind(uid, token.clone()) {
            debug!("replaced session token for uid {uid}");
        }

        self.registry.update_load(&server.name, 1);

        info!(
            "uid {uid} assigned to {} ({}:{}), load was {}",
            server.name, server.host, server.port, server.load
        );

        Ok(Assignment { server, token })
    }

    pub fn validate_login(&self, uid: Uid, token: &str) -> Result<SessionToken, GatewayError> {
        self.tokens.validate(uid, token)
    }

    /// Disconnect hook: gives back the load taken by `issue_and_bind`.
    pub fn release_server(&self, name: &str) {
        self.registry.update_load(name, -1);
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no chat servers available")]
    NoServersAvailable,

    #[error("no session token on file for uid {uid}")]
    UnknownUser { uid: Uid },

    #[error("session token mismatch for uid {uid}")]
    TokenMismatch { uid: Uid },

    #[error("duplicate chat server '{name}'")]
    DuplicateServer { name: String },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
