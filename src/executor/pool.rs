use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

// -----------------------------------------------------------------------------
// ----- ExecutionContext ------------------------------------------------------

#[derive(Debug)]
pub struct ExecutionContext {
    index: usize,
    handle: Handle,
    // Worker parks on this until `stop()`; an idle context must not exit.
    keep_alive: CancellationToken,
    accepting: AtomicBool,
}

impl ExecutionContext {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    pub fn is_running(&self) -> bool {
        self.accepting.load(Ordering::Acquire) && !self.keep_alive.is_cancelled()
    }

    /// Schedules `future` on this context's worker thread.
    pub fn spawn<F>(&self, future: F) -> Result<tokio::task::JoinHandle<F::Output>, ExecutorError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if !self.is_running() {
            return Err(ExecutorError::Stopped { index: self.index });
        }
        Ok(self.handle.spawn(future))
    }
}

// -----------------------------------------------------------------------------
// ----- ExecutorPool ----------------------------------------------------------

/// Fixed set of execution contexts handed out round-robin.
///
/// Work is distributed by rotation only; there is no load measurement.
#[derive(Debug)]
pub struct ExecutorPool {
    contexts: Vec<ExecutionContext>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    next: AtomicUsize,
    stopped: AtomicBool,
}

// -----------------------------------------------------------------------------
// ----- ExecutorPool: Static --------------------------------------------------

impl ExecutorPool {
    pub fn new(size: usize) -> Result<Self, ExecutorError> {
        if size == 0 {
            return Err(ExecutorError::ZeroSize);
        }

        // Built incrementally so that an early return drops (and stops) the
        // workers already started.
        let mut pool = Self {
            contexts: Vec::with_capacity(size),
            workers: Mutex::new(Vec::with_capacity(size)),
            next: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        };

        for index in 0..size {
            let runtime = Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(ExecutorError::Runtime)?;

            let keep_alive = CancellationToken::new();
            let context = ExecutionContext {
                index,
                handle: runtime.handle().clone(),
                keep_alive: keep_alive.clone(),
                accepting: AtomicBool::new(true),
            };

            let worker = thread::Builder::new()
                .name(format!("exec-ctx-{index}"))
                .spawn(move || run_context(index, runtime, keep_alive))
                .map_err(ExecutorError::Spawn)?;

            pool.contexts.push(context);
            pool.workers.get_mut().push(worker);
        }

        info!("started {size} execution contexts");
        Ok(pool)
    }

    /// One context per available CPU.
    pub fn with_default_size() -> Result<Self, ExecutorError> {
        Self::new(num_cpus::get())
    }
}

// -----------------------------------------------------------------------------
// ----- ExecutorPool: Public --------------------------------------------------

impl ExecutorPool {
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Returns the next context in strict rotation.
    pub fn next(&self) -> &ExecutionContext {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.contexts.len();
        &self.contexts[index]
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Shuts every context down and joins the worker threads. Idempotent, and
    /// safe to call from one of the contexts: that thread cannot join itself,
    /// so its handle is kept for the next `stop()` (or `Drop`) made elsewhere.
    ///
    /// `spawn` checks both the accepting flag and the keep-alive marker. A
    /// spawn that passes the check just before phase 1 lands on a runtime that
    /// is about to drop, and its `JoinHandle` resolves as cancelled.
    pub fn stop(&self) {
        let first = !self.stopped.swap(true, Ordering::AcqRel);

        if first {
            // === Phase 1: Release keep-alive markers ===
            for context in &self.contexts {
                context.keep_alive.cancel();
            }

            // === Phase 2: Refuse new work ===
            for context in &self.contexts {
                context.accepting.store(false, Ordering::Release);
            }
        }

        // === Phase 3: Join workers ===
        self.join_workers();

        if first {
            info!("stopped {} execution contexts", self.contexts.len());
        }
    }

    /// Worker threads not joined yet.
    pub fn unjoined_workers(&self) -> usize {
        self.workers.lock().len()
    }
}

// -----------------------------------------------------------------------------
// ----- ExecutorPool: Private -------------------------------------------------

impl ExecutorPool {
    fn join_workers(&self) {
        let workers = std::mem::take(&mut *self.workers.lock());
        let current = thread::current().id();
        let mut kept = Vec::new();

        for worker in workers {
            if worker.thread().id() == current {
                debug!("stop() called from an execution context; not joining self");
                kept.push(worker);
                continue;
            }
            let name = worker.thread().name().map(str::to_owned);
            if worker.join().is_err() {
                warn!("execution context {name:?} panicked");
            }
        }

        self.workers.lock().extend(kept);
    }
}

impl Drop for ExecutorPool {
    fn drop(&mut self) {
        self.stop();
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: Worker ------------------------------------------------------

fn run_context(index: usize, runtime: Runtime, keep_alive: CancellationToken) {
    debug!("execution context {index} started");

    runtime.block_on(keep_alive.cancelled());

    // Dropping the runtime cancels whatever is still queued.
    drop(runtime);

    debug!("execution context {index} stopped");
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("execution context pool needs at least one context")]
    ZeroSize,

    #[error("failed to build execution context runtime: {0}")]
    Runtime(std::io::Error),

    #[error("failed to spawn execution context thread: {0}")]
    Spawn(std::io::Error),

    #[error("execution context {index} is stopped")]
    Stopped { index: usize },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn zero_size_is_rejected() {
        assert!(matches!(ExecutorPool::new(0), Err(ExecutorError::ZeroSize)));
    }

    #[test]
    fn next_is_strict_round_robin() {
        let pool = ExecutorPool::new(3).unwrap();
        let picked: Vec<_> = (0..7).map(|_| pool.next().index()).collect();
        assert_eq!(picked, [0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn spawned_work_runs_on_the_context_thread() {
        let pool = ExecutorPool::new(2).unwrap();
        let (tx, rx) = mpsc::channel();

        for _ in 0..2 {
            let context = pool.next();
            let tx = tx.clone();
            context
                .spawn(async move {
                    let name = thread::current().name().map(str::to_owned);
                    tx.send(name).unwrap();
                })
                .unwrap();
        }

        let mut names: Vec<_> = (0..2)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap().unwrap())
            .collect();
        names.sort();
        assert_eq!(names, ["exec-ctx-0", "exec-ctx-1"]);
    }

    #[test]
    fn idle_contexts_keep_running_timers() {
        let pool = ExecutorPool::new(1).unwrap();
        thread::sleep(Duration::from_millis(50));

        let (tx, rx) = mpsc::channel();
        pool.next()
            .spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                tx.send(()).unwrap();
            })
            .unwrap();

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn stop_is_idempotent_and_refuses_new_work() {
        let pool = ExecutorPool::new(2).unwrap();
        pool.stop();
        pool.stop();

        assert!(pool.is_stopped());
        let err = pool.next().spawn(async {}).unwrap_err();
        assert!(matches!(err, ExecutorError::Stopped { .. }));
    }

    #[test]
    fn stop_from_inside_a_context_does_not_deadlock() {
        let pool = Arc::new(ExecutorPool::new(2).unwrap());
        let (tx, rx) = mpsc::channel();

        let inner = Arc::clone(&pool);
        pool.next()
            .spawn(async move {
                inner.stop();
                tx.send(()).unwrap();
            })
            .unwrap();

        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(pool.is_stopped());
        assert_eq!(pool.unjoined_workers(), 1);

        pool.stop();
        assert_eq!(pool.unjoined_workers(), 0);
    }

    #[test]
    fn every_context_refuses_work_after_stop() {
        let pool = ExecutorPool::new(3).unwrap();
        pool.stop();

        for _ in 0..pool.len() {
            let context = pool.next();
            assert!(!context.is_running());
            assert!(matches!(
                context.spawn(async {}),
                Err(ExecutorError::Stopped { .. })
            ));
        }
        assert_eq!(pool.unjoined_workers(), 0);
    }

    #[test]
    fn spawn_racing_stop_never_leaves_a_hanging_handle() {
        let pool = Arc::new(ExecutorPool::new(2).unwrap());

        let spawner = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                let mut accepted = Vec::new();
                while let Ok(handle) = pool.next().spawn(async { 1 }) {
                    accepted.push(handle);
                }
                accepted
            })
        };

        thread::sleep(Duration::from_millis(10));
        pool.stop();
        let accepted = spawner.join().unwrap();

        let runtime = Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            for handle in accepted {
                let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
                    .await
                    .expect("handle never resolved");
                if let Err(err) = outcome {
                    assert!(err.is_cancelled());
                }
            }
        });
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
