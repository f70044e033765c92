//! Round-robin pool of single-threaded execution contexts.
//!
//! Each [`ExecutionContext`] is a current-thread Tokio runtime parked on its
//! own OS thread. Callers take contexts in strict rotation via
//! [`ExecutorPool::next`] and spawn independent units of work onto them, so a
//! slow task only ever delays the tasks that share its context.

pub mod pool;

pub use pool::{ExecutionContext, ExecutorError, ExecutorPool};
