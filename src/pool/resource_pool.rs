use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::connector::Connector;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

// -----------------------------------------------------------------------------
// ----- PoolOptions -----------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub name: String,
    pub capacity: usize,
    pub sweep_interval: Duration,
}

impl PoolOptions {
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            capacity,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

// -----------------------------------------------------------------------------
// ----- PoolStats -------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub name: String,
    pub capacity: usize,
    pub idle: usize,
    pub checked_out: usize,
    pub pending: usize,
    pub closed: bool,
}

// -----------------------------------------------------------------------------
// ----- ResourcePool ----------------------------------------------------------

/// Bounded set of live backend connections.
///
/// All `capacity` connections are opened up front. A dedicated sweep thread
/// probes connections that sat idle for a whole interval, replaces the dead
/// ones and tops the pool back up when slots were lost.
pub struct ResourcePool<C: Connector> {
    shared: Arc<Shared<C>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

// -----------------------------------------------------------------------------
// ----- ResourcePool: Static --------------------------------------------------

impl<C: Connector> ResourcePool<C> {
    /// Opens `options.capacity` connections. Any failure aborts construction;
    /// connections opened so far are dropped before returning.
    pub fn new(connector: C, options: PoolOptions) -> Result<Self, PoolError> {
        let PoolOptions {
            name,
            capacity,
            sweep_interval,
        } = options;

        if capacity == 0 {
            return Err(PoolError::ZeroCapacity { pool: name });
        }

        let mut idle = VecDeque::with_capacity(capacity);
        for _ in 0..capacity {
            let conn = connector.connect().map_err(|e| PoolError::Connect {
                pool: name.clone(),
                source: Box::new(e),
            })?;
            idle.push_back(IdleConnection::fresh(conn));
        }

        let shared = Arc::new(Shared {
            name: name.clone(),
            capacity,
            sweep_interval,
            connector,
            state: Mutex::new(PoolState {
                idle,
                checked_out: 0,
                pending: 0,
                stopped: false,
            }),
            available: Condvar::new(),
            sweep_wakeup: Condvar::new(),
        });

        let sweeper = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(format!("{name}-sweep"))
                .spawn(move || shared.run_sweeper())
                .map_err(|source| PoolError::Spawn {
                    pool: name.clone(),
                    source,
                })?
        };

        info!(
            "pool {name}: opened {capacity} connections (sweep every {})",
            humantime::format_duration(sweep_interval)
        );

        Ok(Self {
            shared,
            sweeper: Mutex::new(Some(sweeper)),
        })
    }
}

// -----------------------------------------------------------------------------
// ----- ResourcePool: Public --------------------------------------------------

impl<C: Connector> ResourcePool<C> {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Waits up to `timeout` for an idle connection.
    pub fn acquire(&self, timeout: Duration) -> Result<PooledConnection<C>, PoolError> {
        // A timeout too large to represent waits without a deadline.
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.shared.state.lock();

        loop {
            if state.stopped {
                return Err(PoolError::Closed {
                    pool: self.shared.name.clone(),
                });
            }

            if let Some(idle) = state.idle.pop_front() {
                state.checked_out += 1;
                return Ok(PooledConnection::new(Arc::clone(&self.shared), idle.conn));
            }

            let timed_out = match deadline {
                Some(deadline) => self
                    .shared
                    .available
                    .wait_until(&mut state, deadline)
                    .timed_out(),
                None => {
                    self.shared.available.wait(&mut state);
                    false
                }
            };

            if timed_out && state.idle.is_empty() && !state.stopped {
                return Err(PoolError::Exhausted {
                    pool: self.shared.name.clone(),
                    timeout,
                });
            }
        }
    }

    /// Hands a checked-out connection back. `None` is a no-op.
    ///
    /// The connection always returns to the pool it was acquired from, which
    /// is also what dropping the guard does.
    pub fn release(&self, conn: Option<PooledConnection<C>>) {
        drop(conn);
    }

    /// Stops the pool: waiters wake up with `PoolError::Closed`, idle
    /// connections are dropped and the sweep thread is joined. Idempotent.
    pub fn close(&self) {
        let drained = {
            let mut state = self.shared.state.lock();
            if state.stopped {
                return;
            }
            state.stopped = true;
            std::mem::take(&mut state.idle)
        };

        self.shared.available.notify_all();
        self.shared.sweep_wakeup.notify_all();

        let dropped = drained.len();
        drop(drained);

        if let Some(sweeper) = self.sweeper.lock().take() {
            if sweeper.join().is_err() {
                warn!("pool {}: sweep thread panicked", self.shared.name);
            }
        }

        info!(
            "pool {}: closed, dropped {dropped} idle connections",
            self.shared.name
        );
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().stopped
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            name: self.shared.name.clone(),
            capacity: self.shared.capacity,
            idle: state.idle.len(),
            checked_out: state.checked_out,
            pending: state.pending,
            closed: state.stopped,
        }
    }
}

impl<C: Connector> Drop for ResourcePool<C> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<C: Connector> fmt::Debug for ResourcePool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("stats", &self.stats())
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Shared ------------------------------------------------------

struct Shared<C: Connector> {
    name: String,
    capacity: usize,
    sweep_interval: Duration,
    connector: C,
    state: Mutex<PoolState<C::Connection>>,
    available: Condvar,
    sweep_wakeup: Condvar,
}

struct PoolState<T> {
    idle: VecDeque<IdleConnection<T>>,
    checked_out: usize,
    // Slots held by the sweep thread: connections being probed and
    // replacements being opened. They count against capacity.
    pending: usize,
    stopped: bool,
}

impl<T> PoolState<T> {
    fn live(&self) -> usize {
        self.idle.len() + self.checked_out + self.pending
    }
}

struct IdleConnection<T> {
    conn: T,
    last_used: Instant,
}

impl<T> IdleConnection<T> {
    fn fresh(conn: T) -> Self {
        Self {
            conn,
            last_used: Instant::now(),
        }
    }
}

impl<C: Connector> Shared<C> {
    fn put_back(&self, conn: C::Connection) {
        let mut state = self.state.lock();
        state.checked_out = state.checked_out.saturating_sub(1);

        if state.stopped {
            drop(state);
            debug!("pool {}: closed, discarding returned connection", self.name);
            return;
        }

        state.idle.push_back(IdleConnection::fresh(conn));
        drop(state);
        self.available.notify_one();
    }

    fn forget_checkout(&self) {
        let mut state = self.state.lock();
        state.checked_out = state.checked_out.saturating_sub(1);
    }

    fn run_sweeper(&self) {
        let mut state = self.state.lock();

        loop {
            let deadline = Instant::now() + self.sweep_interval;
            while !state.stopped && Instant::now() < deadline {
                let _ = self.sweep_wakeup.wait_until(&mut state, deadline);
            }

            if state.stopped {
                break;
            }

            MutexGuard::unlocked(&mut state, || self.sweep());
        }

        debug!("pool {}: sweep thread exiting", self.name);
    }

    fn sweep(&self) {
        let stale = {
            let mut state = self.state.lock();
            if state.stopped {
                return;
            }

            let (fresh, stale): (VecDeque<_>, VecDeque<_>) = state
                .idle
                .drain(..)
                .partition(|idle| idle.last_used.elapsed() < self.sweep_interval);

            state.idle = fresh;
            state.pending += stale.len();
            stale
        };

        let probed = stale.len();
        let mut survivors = Vec::with_capacity(probed);

        for mut idle in stale {
            match self.connector.is_alive(&mut idle.conn) {
                Ok(()) => {
                    idle.last_used = Instant::now();
                    survivors.push(idle);
                }
                Err(err) => {
                    warn!("pool {}: dead connection ({err}), reconnecting", self.name);
                    drop(idle);

                    match self.connector.connect() {
                        Ok(conn) => survivors.push(IdleConnection::fresh(conn)),
                        Err(err) => warn!("pool {}: reconnect failed: {err}", self.name),
                    }
                }
            }
        }

        let missing = {
            let mut state = self.state.lock();
            state.pending -= probed;
            if state.stopped {
                return;
            }

            state.idle.extend(survivors);
            let missing = self.capacity.saturating_sub(state.live());
            state.pending += missing;
            missing
        };

        if probed > 0 {
            debug!("pool {}: probed {probed} idle connections", self.name);
            self.available.notify_all();
        }

        self.replenish(missing);
    }

    fn replenish(&self, missing: usize) {
        if missing == 0 {
            return;
        }

        let mut created = Vec::with_capacity(missing);
        for _ in 0..missing {
            match self.connector.connect() {
                Ok(conn) => created.push(IdleConnection::fresh(conn)),
                Err(err) => {
                    warn!(
                        "pool {}: replenishment failed, running below capacity: {err}",
                        self.name
                    );
                    break;
                }
            }
        }

        let added = created.len();
        {
            let mut state = self.state.lock();
            state.pending -= missing;
            if state.stopped {
                return;
            }
            state.idle.extend(created);
        }

        if added > 0 {
            info!("pool {}: replenished {added}/{missing} connections", self.name);
            self.available.notify_all();
        }
    }
}

// -----------------------------------------------------------------------------
// ----- PooledConnection ------------------------------------------------------

/// Exclusive handle on a checked-out connection. Dropping it returns the
/// connection to its pool.
pub struct PooledConnection<C: Connector> {
    shared: Arc<Shared<C>>,
    conn: Option<C::Connection>,
}

impl<C: Connector> PooledConnection<C> {
    fn new(shared: Arc<Shared<C>>, conn: C::Connection) -> Self {
        Self {
            shared,
            conn: Some(conn),
        }
    }

    /// Drops the connection instead of returning it, for callers that saw it
    /// fail. The next sweep refills the slot.
    pub fn discard(mut self) {
        if self.conn.take().is_some() {
            self.shared.forget_checkout();
        }
    }
}

impl<C: Connector> Deref for PooledConnection<C> {
    type Target = C::Connection;

    fn deref(&self) -> &Self::Target {
        self.conn
            .as_ref()
            .expect("pooled connection missing backend connection")
    }
}

impl<C: Connector> DerefMut for PooledConnection<C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
            .as_mut()
            .expect("pooled connection missing backend connection")
    }
}

impl<C: Connector> Drop for PooledConnection<C> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.shared.put_back(conn);
        }
    }
}

impl<C: Connector> fmt::Debug for PooledConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("pool", &self.shared.name)
            .finish()
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool '{pool}' exhausted: no connection available within {timeout:?}")]
    Exhausted { pool: String, timeout: Duration },

    #[error("pool '{pool}' is closed")]
    Closed { pool: String },

    #[error("pool '{pool}' configured with zero capacity")]
    ZeroCapacity { pool: String },

    #[error("pool '{pool}' failed to open backend connection: {source}")]
    Connect {
        pool: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("pool '{pool}' failed to start sweep thread: {source}")]
    Spawn {
        pool: String,
        source: std::io::Error,
    },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
