//! Fork-join worker pool, one thread per virtual process.
//!
//! Parallel regions hand every worker a disjoint piece of state, so the
//! per-thread hot paths run without locks. The join at the end of a region
//! is the barrier; anything that follows runs on exactly one worker.
//!
//! ```text
//!   for_each_worker            collect_then_single
//!
//!   w0  w1  w2  w3             w0  w1  w2  w3     ← collect (shared Mutex)
//!    │   │   │   │              │   │   │   │
//!   ─┴───┴───┴───┴─ join       ─┴───┴───┴───┴─    ← barrier
//!                                     │
//!                                   single        ← one worker
//! ```

use axon_types::{RoutingError, ThreadId};
use parking_lot::Mutex;
use rayon::prelude::*;

/// Fixed pool of worker threads.
pub struct WorkerPool {
    pool: rayon::ThreadPool,
    num_threads: usize,
}

impl WorkerPool {
    /// Build a pool with `num_threads` workers.
    pub fn new(num_threads: usize) -> Result<Self, RoutingError> {
        if num_threads == 0 {
            return Err(RoutingError::InvalidConfig(
                "worker pool needs at least one thread".to_string(),
            ));
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|i| format!("vp-{}", i))
            .build()
            .map_err(|e| RoutingError::ThreadPool(e.to_string()))?;

        tracing::debug!(num_threads, "Built worker pool");
        Ok(Self { pool, num_threads })
    }

    /// Number of workers.
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Run `f` once per worker, each with exclusive access to its own item.
    ///
    /// # Panics
    ///
    /// Panics if `items` does not hold exactly one entry per worker.
    pub fn for_each_worker<T, F>(&self, items: &mut [T], f: F)
    where
        T: Send,
        F: Fn(ThreadId, &mut T) + Send + Sync,
    {
        assert_eq!(
            items.len(),
            self.num_threads,
            "parallel region needs one item per worker"
        );
        self.pool.install(|| {
            items
                .par_iter_mut()
                .enumerate()
                .for_each(|(tid, item)| f(tid, item));
        });
    }

    /// Run `collect` on every worker against a shared, mutex-guarded
    /// accumulator, wait for all of them, then hand the accumulator to
    /// `single` on one worker.
    ///
    /// # Panics
    ///
    /// Panics if `items` does not hold exactly one entry per worker.
    pub fn collect_then_single<T, S, R, C, F>(&self, items: &[T], shared: S, collect: C, single: F) -> R
    where
        T: Sync,
        S: Send,
        R: Send,
        C: Fn(ThreadId, &T, &Mutex<S>) + Send + Sync,
        F: FnOnce(S) -> R + Send,
    {
        assert_eq!(
            items.len(),
            self.num_threads,
            "parallel region needs one item per worker"
        );
        let shared = Mutex::new(shared);
        self.pool.install(move || {
            items
                .par_iter()
                .enumerate()
                .for_each(|(tid, item)| collect(tid, item, &shared));
            single(shared.into_inner())
        })
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads)
            .finish()
    }
}
