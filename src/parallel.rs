//! Rayon thread pool setup for the min/max folds
//!
//! Only eager buffers above [`PARALLEL_THRESHOLD`](crate::statistics::parallel::PARALLEL_THRESHOLD)
//! elements are folded in parallel, so the pool matters for large classic stacks
//! and logical recovery; lazy HDF5 reads stay on the calling thread.

use crate::errors::{MatImagesError, Result};
use rayon::ThreadPoolBuilder;
use std::fmt;
use tracing::info;

/// Thread count for the global pool, `None` meaning one per CPU core
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParallelConfig {
    pub num_threads: Option<usize>,
}

impl ParallelConfig {
    pub fn with_threads(num_threads: usize) -> Self {
        Self {
            num_threads: Some(num_threads),
        }
    }

    pub fn all_cores() -> Self {
        Self::with_threads(num_cpus::get())
    }

    /// Threads the pool will actually get (at least one)
    #[must_use]
    pub fn resolved_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Install the global Rayon pool and return its size
    ///
    /// # Errors
    ///
    /// Returns a `ThreadPoolError` if the global pool was already initialized.
    pub fn setup_global_pool(&self) -> Result<usize> {
        let threads = self.resolved_threads();
        ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("matimg-{i}"))
            .build_global()
            .map_err(|e| {
                MatImagesError::ThreadPoolError(format!("cannot start {threads} worker threads: {e}"))
            })?;
        info!(threads, "configured parallel processing");
        Ok(threads)
    }
}

/// Snapshot of the parallel environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParallelInfo {
    pub current_threads: usize,
    pub available_cores: usize,
    pub available_parallelism: usize,
}

pub fn get_parallel_info() -> ParallelInfo {
    ParallelInfo {
        current_threads: rayon::current_num_threads(),
        available_cores: num_cpus::get(),
        available_parallelism: std::thread::available_parallelism().map_or(1, |p| p.get()),
    }
}

impl fmt::Display for ParallelInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "📊 Parallel Processing Information:")?;
        writeln!(f, "   Worker threads: {}", self.current_threads)?;
        writeln!(f, "   CPU cores: {}", self.available_cores)?;
        write!(f, "   Available parallelism: {}", self.available_parallelism)
    }
}
