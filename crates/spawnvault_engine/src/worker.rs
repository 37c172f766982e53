//! # Worker Pool
//!
//! Bounded pool of threads fed by a crossbeam channel. Everything that must
//! not block an aggregate's owning path runs here: sale pipelines, sale
//! logging, viewer fan-out. Payment deposits get their own thread instead;
//! a pipeline blocked on its deposit must never be able to occupy the
//! lane that deposit needs.
//!
//! The pool keeps at least two threads so one long pipeline cannot stall
//! all loot and transfer work behind it.

use crossbeam_channel::{bounded, Sender};
use parking_lot::Mutex;
use std::thread::JoinHandle;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Minimum number of pool threads.
pub const MIN_WORKERS: usize = 2;

/// Default job queue depth.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

/// A fixed-size worker pool with a bounded job queue.
pub struct WorkerPool {
    tx: Mutex<Option<Sender<Job>>>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Creates a pool with `threads` workers (clamped to at least
    /// [`MIN_WORKERS`]).
    #[must_use]
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(MIN_WORKERS);
        let (tx, rx) = bounded::<Job>(DEFAULT_QUEUE_DEPTH);

        let handles = (0..threads)
            .map(|_| {
                let rx = rx.clone();
                std::thread::spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                })
            })
            .collect();

        Self {
            tx: Mutex::new(Some(tx)),
            handles: Mutex::new(handles),
        }
    }

    /// Submits a job. Returns false if the pool has shut down.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(tx) = self.tx.lock().clone() else {
            return false;
        };
        tx.send(Box::new(job)).is_ok()
    }

    /// Stops accepting jobs, drains the queue, and joins all workers.
    pub fn shutdown(&self) {
        drop(self.tx.lock().take());
        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            if handle.join().is_err() {
                tracing::warn!("worker thread panicked during shutdown");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn jobs_run_on_pool_threads() {
        let pool = WorkerPool::new(2);
        let counter = Arc::new(AtomicU32::new(0));

        for _ in 0..50 {
            let counter = Arc::clone(&counter);
            assert!(pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }

        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 50, "shutdown drains the queue");
    }

    #[test]
    fn execute_after_shutdown_is_refused() {
        let pool = WorkerPool::new(2);
        pool.shutdown();
        assert!(!pool.execute(|| {}));
    }

    #[test]
    fn pool_size_is_clamped() {
        let pool = WorkerPool::new(0);
        assert!(pool.execute(|| {}));
        pool.shutdown();
    }
}
