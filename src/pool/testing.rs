use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use super::Connector;

// -----------------------------------------------------------------------------
// ----- FakeBackend -----------------------------------------------------------

/// In-memory stand-in for a database server. Tracks every connection it has
/// handed out so tests can kill them and check for leaks.
#[derive(Debug)]
pub(crate) struct FakeBackend {
    next_id: AtomicUsize,
    open: AtomicUsize,
    connects_allowed: AtomicUsize,
    dead: Mutex<HashSet<usize>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Arc<Self> {
        Self::with_connect_budget(usize::MAX)
    }

    /// Refuses every connection attempt after `budget` successful ones.
    pub(crate) fn with_connect_budget(budget: usize) -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicUsize::new(0),
            open: AtomicUsize::new(0),
            connects_allowed: AtomicUsize::new(budget),
            dead: Mutex::new(HashSet::new()),
        })
    }

    pub(crate) fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub(crate) fn kill(&self, id: usize) {
        self.dead.lock().insert(id);
    }

    pub(crate) fn refuse_connects(&self) {
        self.connects_allowed.store(0, Ordering::SeqCst);
    }

    pub(crate) fn allow_connects(&self) {
        self.connects_allowed.store(usize::MAX, Ordering::SeqCst);
    }
}

// -----------------------------------------------------------------------------
// ----- FakeConnector ---------------------------------------------------------

#[derive(Debug, Clone)]
pub(crate) struct FakeConnector {
    backend: Arc<FakeBackend>,
}

impl FakeConnector {
    pub(crate) fn new(backend: &Arc<FakeBackend>) -> Self {
        Self {
            backend: Arc::clone(backend),
        }
    }
}

#[derive(Debug)]
pub(crate) struct FakeConnection {
    pub(crate) id: usize,
    backend: Arc<FakeBackend>,
}

impl Drop for FakeConnection {
    fn drop(&mut self) {
        self.backend.open.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Error)]
pub(crate) enum FakeError {
    #[error("connection refused")]
    Refused,

    #[error("connection {0} is dead")]
    Dead(usize),
}

impl Connector for FakeConnector {
    type Connection = FakeConnection;
    type Error = FakeError;

    fn connect(&self) -> Result<FakeConnection, FakeError> {
        let allowed = self.backend.connects_allowed.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |left| left.checked_sub(1),
        );
        if allowed.is_err() {
            return Err(FakeError::Refused);
        }

        let id = self.backend.next_id.fetch_add(1, Ordering::SeqCst);
        self.backend.open.fetch_add(1, Ordering::SeqCst);

        Ok(FakeConnection {
            id,
            backend: Arc::clone(&self.backend),
        })
    }

    fn is_alive(&self, conn: &mut FakeConnection) -> Result<(), FakeError> {
        if self.backend.dead.lock().contains(&conn.id) {
            return Err(FakeError::Dead(conn.id));
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
