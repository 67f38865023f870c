//! Bounded worker pool for CPU-bound work.
//!
//! Async callers hand a closure to [`WorkerPool::submit`] and await the
//! returned future; the closure runs on one of a fixed number of rayon
//! threads, never on the async runtime. Parallel iterators used inside a
//! job (for example by a rebuild) run on the same bounded pool.

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tokio::sync::oneshot;
use tracing::error;

use crate::error::{Result, SentryError};

pub struct WorkerPool {
    pool: ThreadPool,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.threads())
            .finish()
    }
}

impl WorkerPool {
    /// Build a pool of `threads` workers (at least one).
    pub fn new(threads: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("sentry-worker-{i}"))
            .build()
            .map_err(|e| SentryError::WorkerPool(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queue `job` on the pool.
    ///
    /// The job starts immediately; the returned future only waits for its
    /// result. Dropping the future discards the result without cancelling
    /// the job. A panicking job resolves to [`SentryError::WorkerPool`].
    pub fn submit<F, T>(&self, job: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.pool.spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job));
            // The receiver may already be gone if the caller stopped waiting.
            let _ = tx.send(outcome);
        });

        async move {
            match rx.await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(payload)) => {
                    let message = panic_message(payload.as_ref());
                    error!(panic = %message, "Worker job panicked");
                    Err(SentryError::WorkerPool(format!("job panicked: {message}")))
                }
                Err(_) => Err(SentryError::WorkerPool(
                    "worker dropped the job before completion".into(),
                )),
            }
        }
    }

    /// Run `op` on the pool, blocking the current thread until it finishes.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[tokio::test]
    async fn test_submit_returns_result() {
        let pool = WorkerPool::new(2).unwrap();
        let value = pool.submit(|| 6 * 7).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_jobs_run_on_worker_threads() {
        let pool = WorkerPool::new(1).unwrap();
        let name = pool
            .submit(|| std::thread::current().name().map(str::to_string))
            .await
            .unwrap();
        assert_eq!(name.as_deref(), Some("sentry-worker-0"));
    }

    #[tokio::test]
    async fn test_panic_becomes_error() {
        let pool = WorkerPool::new(1).unwrap();
        let result = pool.submit(|| -> u32 { panic!("boom") }).await;

        match result {
            Err(SentryError::WorkerPool(message)) => assert!(message.contains("boom")),
            other => panic!("expected worker pool error, got {other:?}"),
        }

        // The pool keeps serving after a panicking job.
        assert_eq!(pool.submit(|| 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_submissions() {
        let pool = WorkerPool::new(4).unwrap();
        let futures: Vec<_> = (0..32u64).map(|i| pool.submit(move || i * i)).collect();

        let mut total = 0;
        for future in futures {
            total += future.await.unwrap();
        }
        assert_eq!(total, (0..32u64).map(|i| i * i).sum::<u64>());
    }

    #[test]
    fn test_thread_count_is_bounded() {
        assert_eq!(WorkerPool::new(0).unwrap().threads(), 1);

        let pool = WorkerPool::new(3).unwrap();
        assert_eq!(pool.threads(), 3);
        let max_threads = pool.install(|| {
            (0..100)
                .into_par_iter()
                .map(|_| rayon::current_num_threads())
                .max()
                .unwrap_or(0)
        });
        assert_eq!(max_threads, 3);
    }
}
