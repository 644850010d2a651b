//! Bounded Rayon worker pool for the CPU-bound stages of a match job.
//!
//! Each job owns its pool, sized from configuration, so concurrently running
//! jobs never contend for one global pool. Workers only ever see immutable
//! slices; results are merged by the owning job.

use rayon::ThreadPool;
use std::sync::Arc;

use crate::error::ConfigError;

#[derive(Clone)]
pub struct WorkerPool {
    pool: Arc<ThreadPool>,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.current_num_threads())
            .finish()
    }
}

impl WorkerPool {
    pub fn new(num_threads: usize, name: &str) -> Result<Self, ConfigError> {
        let prefix = name.to_string();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads.max(1))
            .thread_name(move |i| format!("{}-{}", prefix, i))
            .build()
            .map_err(|e| ConfigError::WorkerPool(e.to_string()))?;
        log::debug!(
            "[Worker Pool] Created '{}' pool with {} threads",
            name,
            pool.current_num_threads()
        );
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    pub fn current_num_threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Execute a closure inside the pool
    pub fn install<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_pool_creation() {
        let pool = WorkerPool::new(2, "matcher-test").unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }

    #[test]
    fn test_zero_threads_clamped() {
        let pool = WorkerPool::new(0, "matcher-test").unwrap();
        assert_eq!(pool.current_num_threads(), 1);
    }

    #[test]
    fn test_install() {
        let pool = WorkerPool::new(2, "matcher-test").unwrap();
        let result = pool.install(|| (0..100).into_par_iter().sum::<i32>());
        assert_eq!(result, 4950);
    }

    #[test]
    fn test_thread_naming() {
        let pool = WorkerPool::new(1, "matcher-named").unwrap();
        let thread_name = pool.install(|| std::thread::current().name().unwrap_or("").to_string());
        assert!(thread_name.starts_with("matcher-named"));
    }
}
