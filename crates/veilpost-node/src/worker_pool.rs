//! Bounded pool for CPU-bound seal/open work.
//!
//! KEM and AEAD operations block for microseconds to milliseconds, too long
//! for an async executor thread. Jobs run on tokio's blocking threads; a
//! semaphore caps how many run at once so a burst of large envelopes cannot
//! starve the rest of the process.
//!
//! The permit travels with the job. Dropping the caller's future does not
//! stop a job already running: it finishes, releases its permit and its
//! result is discarded. The core's state stays consistent either way.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::NodeError;

/// Bounded blocking worker pool.
#[derive(Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    workers: usize,
}

impl WorkerPool {
    /// Pool running at most `workers` jobs at once (minimum one).
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        Self { permits: Arc::new(Semaphore::new(workers)), workers }
    }

    /// Configured concurrency.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Jobs that could start right now without waiting.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on a blocking thread once a permit is free.
    ///
    /// # Errors
    ///
    /// - `ShutDown` if the pool was closed
    /// - `Worker` if the job panicked
    pub async fn run<F, T>(&self, job: F) -> Result<T, NodeError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits).acquire_owned().await.map_err(|_| NodeError::ShutDown)?;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            job()
        })
        .await
        .map_err(|err| NodeError::Worker(err.to_string()))
    }

    /// Refuse new jobs. Running jobs finish.
    pub fn close(&self) {
        self.permits.close();
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn never_exceeds_worker_count() {
        let pool = WorkerPool::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    pool.run(move || {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
                })
            })
            .collect();

        for job in jobs {
            job.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn closed_pool_refuses_jobs() {
        let pool = WorkerPool::new(1);
        pool.close();
        assert!(matches!(pool.run(|| 1).await, Err(NodeError::ShutDown)));
    }

    #[tokio::test]
    async fn panicking_job_is_reported() {
        let pool = WorkerPool::new(1);
        let result: Result<(), _> = pool.run(|| panic!("boom")).await;
        assert!(matches!(result, Err(NodeError::Worker(_))));
        assert_eq!(pool.available(), 1);
    }
}
