//! The thread-pool primitive used for parallel fan-out: per-run range
//! probes and per-level compaction tasks.
//!
//! Treated as an opaque trait so callers never depend on `rayon` directly;
//! [`RayonExecutor`] is the one
//! production implementation, backed by a dedicated `rayon` thread pool
//! sized by the configured executor width. [`SequentialExecutor`] exists
//! for tests that want deterministic, single-threaded ordering.

use anyhow::{Context, Result};
use rayon::prelude::*;

/// Runs a batch of independent tasks to completion, returning their results
/// in the same order the tasks were submitted.
pub trait Executor: Send + Sync {
    fn map<T, F>(&self, tasks: Vec<F>) -> Vec<T>
    where
        F: FnOnce() -> T + Send,
        T: Send;
}

/// Production executor: a dedicated `rayon` thread pool.
pub struct RayonExecutor {
    pool: rayon::ThreadPool,
}

impl RayonExecutor {
    pub fn new(width: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(width.max(1))
            .build()
            .context("failed to build executor thread pool")?;
        Ok(Self { pool })
    }
}

impl Executor for RayonExecutor {
    fn map<T, F>(&self, tasks: Vec<F>) -> Vec<T>
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        self.pool.install(|| tasks.into_par_iter().map(|f| f()).collect())
    }
}

/// Deterministic single-threaded executor, substituted in tests that need
/// predictable interleaving.
pub struct SequentialExecutor;

impl Executor for SequentialExecutor {
    fn map<T, F>(&self, tasks: Vec<F>) -> Vec<T>
    where
        F: FnOnce() -> T + Send,
        T: Send,
    {
        tasks.into_iter().map(|f| f()).collect()
    }
}
