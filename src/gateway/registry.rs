use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::{debug, warn};

use super::GatewayError;

// -----------------------------------------------------------------------------
// ----- ChatServer ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatServer {
    pub name: String,
    pub host: String,
    pub port: String,
    pub load: u32,
}

// -----------------------------------------------------------------------------
// ----- ServerRegistry --------------------------------------------------------

/// Chat servers keyed by name. Iteration is ascending by name, which makes
/// it the tie-break for equal loads.
#[derive(Debug, Default)]
pub struct ServerRegistry {
    servers: Mutex<BTreeMap<String, ChatServer>>,
}

// -----------------------------------------------------------------------------
// ----- ServerRegistry: Public ------------------------------------------------

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Startup registration; the server starts with zero load.
    pub fn register(
        &self,
        name: impl Into<String>,
        host: impl Into<String>,
        port: impl Into<String>,
    ) -> Result<(), GatewayError> {
        let name = name.into();
        let mut servers = self.servers.lock();

        if servers.contains_key(&name) {
            return Err(GatewayError::DuplicateServer { name });
        }

        let server = ChatServer {
            name: name.clone(),
            host: host.into(),
            port: port.into(),
            load: 0,
        };
        debug!(
            "registered chat server {} at {}:{}",
            server.name, server.host, server.port
        );
        servers.insert(name, server);
        Ok(())
    }

    /// Least-loaded server; the first one by name wins a tie.
    pub fn select(&self) -> Result<ChatServer, GatewayError> {
        let servers = self.servers.lock();
        servers
            .values()
            .min_by_key(|server| server.load)
            .cloned()
            .ok_or(GatewayError::NoServersAvailable)
    }

    /// Adds `delta` to the named server's load, clamped at zero. Unknown names
    /// are ignored with a warning.
    pub fn update_load(&self, name: &str, delta: i64) {
        let mut servers = self.servers.lock();

        let Some(server) = servers.get_mut(name) else {
            warn!("load update for unknown chat server '{name}' ignored");
            return;
        };

        let before = server.load;
        let after = (i64::from(before) + delta).clamp(0, i64::from(u32::MAX));
        server.load = after as u32;
        debug!("chat server {name} load {before} -> {}", server.load);
    }

    pub fn snapshot(&self) -> Vec<ChatServer> {
        self.servers.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.servers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.lock().is_empty()
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(loads: &[(&str, i64)]) -> ServerRegistry {
        let registry = ServerRegistry::new();
        for (name, load) in loads {
            registry.register(*name, "127.0.0.1", "8090").unwrap();
            registry.update_load(name, *load);
        }
        registry
    }

    #[test]
    fn empty_registry_has_nothing_to_select() {
        let registry = ServerRegistry::new();
        assert!(matches!(
            registry.select(),
            Err(GatewayError::NoServersAvailable)
        ));
    }

    #[test]
    fn selects_minimum_load_with_name_order_tie_break() {
        let registry = registry(&[("C", 1), ("A", 3), ("B", 1)]);

        for _ in 0..10 {
            assert_eq!(registry.select().unwrap().name, "B");
        }
    }

    #[test]
    fn loaded_server_is_not_selected_while_another_is_lighter() {
        let registry = registry(&[("A", 0), ("B", 0)]);

        registry.update_load("A", 1);
        assert_eq!(registry.select().unwrap().name, "B");

        registry.update_load("B", 2);
        assert_eq!(registry.select().unwrap().name, "A");
    }

    #[test]
    fn load_never_goes_negative() {
        let registry = registry(&[("A", 1)]);
        registry.update_load("A", -5);
        assert_eq!(registry.snapshot()[0].load, 0);
    }

    #[test]
    fn unknown_server_update_is_a_no_op() {
        let registry = registry(&[("A", 2)]);
        registry.update_load("nope", 1);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].load, 2);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = registry(&[("A", 0)]);
        let err = registry.register("A", "10.0.0.1", "1").unwrap_err();
        assert!(matches!(err, GatewayError::DuplicateServer { ref name } if name == "A"));
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
