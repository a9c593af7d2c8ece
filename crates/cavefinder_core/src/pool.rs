//! # Worker Pool
//!
//! Fixed set of named OS threads draining a bounded work queue.
//!
//! A pool lives for one segment: the controller spawns it, submits every
//! unit, then calls [`WorkerPool::join`] to wait for the queue to drain.
//! Once the [`CancelToken`] fires, workers stop running the handler and
//! discard whatever is still queued, so neither submission nor join can
//! hang on a cancelled scan.

use crate::error::{ScanError, ScanResult};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Queued units allowed per worker before `submit` blocks.
const QUEUE_DEPTH_PER_WORKER: usize = 256;

/// Cooperative cancellation flag shared by the controller and all workers.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates an unset token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Threads executing one handler over submitted units.
pub struct WorkerPool<T: Send + 'static> {
    sender: Option<Sender<T>>,
    workers: Vec<JoinHandle<()>>,
    cancel: CancelToken,
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Starts `threads` workers that call `handler` for every unit.
    pub fn spawn<F>(name: &str, threads: usize, cancel: CancelToken, handler: Arc<F>) -> ScanResult<Self>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        if threads == 0 {
            return Err(ScanError::InvalidRequest("thread count must be at least 1".into()));
        }
        let (sender, receiver) = bounded::<T>(threads.saturating_mul(QUEUE_DEPTH_PER_WORKER));
        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(threads),
            cancel,
        };

        for index in 0..threads {
            let receiver = receiver.clone();
            let cancel = pool.cancel.clone();
            let handler = Arc::clone(&handler);
            let worker = thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || Self::worker_loop(&receiver, &cancel, &*handler))
                .map_err(|e| ScanError::Pool(format!("failed to spawn worker {index}: {e}")))?;
            pool.workers.push(worker);
        }
        debug!(name, threads, "Worker pool started");
        Ok(pool)
    }

    fn worker_loop<F: Fn(T)>(receiver: &Receiver<T>, cancel: &CancelToken, handler: &F) {
        for unit in receiver {
            if cancel.is_cancelled() {
                continue;
            }
            handler(unit);
        }
    }

    /// Queues a unit. Returns `false` once the pool no longer accepts work.
    pub fn submit(&self, unit: T) -> bool {
        match &self.sender {
            Some(sender) => sender.send(unit).is_ok(),
            None => false,
        }
    }

    /// Closes the queue and waits for every worker to finish.
    pub fn join(mut self) -> ScanResult<()> {
        self.join_workers()
    }

    /// Cancels outstanding work, then waits for the workers to exit.
    pub fn shutdown_now(mut self) -> ScanResult<()> {
        self.cancel.cancel();
        self.join_workers()
    }

    fn join_workers(&mut self) -> ScanResult<()> {
        self.sender = None;
        let mut panicked = 0usize;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                panicked += 1;
            }
        }
        debug!(panicked, "Worker pool stopped");
        if panicked > 0 {
            return Err(ScanError::Pool(format!("{panicked} worker(s) panicked")));
        }
        Ok(())
    }
}

impl<T: Send + 'static> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        // Result already reported by join() when called explicitly.
        let _ = self.join_workers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use std::time::Duration;

    #[test]
    fn test_every_unit_runs_once() {
        let sum = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&sum);
        let pool = WorkerPool::spawn(
            "test",
            4,
            CancelToken::new(),
            Arc::new(move |n: u64| {
                seen.fetch_add(n, Ordering::Relaxed);
            }),
        )
        .unwrap();
        for n in 1..=10_000u64 {
            assert!(pool.submit(n));
        }
        pool.join().unwrap();
        assert_eq!(sum.load(Ordering::Relaxed), 10_000 * 10_001 / 2);
    }

    #[test]
    fn test_zero_threads_rejected() {
        let result = WorkerPool::spawn("test", 0, CancelToken::new(), Arc::new(|_: u8| {}));
        assert!(matches!(result, Err(ScanError::InvalidRequest(_))));
    }

    #[test]
    fn test_cancel_discards_queued_units() {
        let ran = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&ran);
        let cancel = CancelToken::new();
        let pool = WorkerPool::spawn(
            "test",
            1,
            cancel.clone(),
            Arc::new(move |_: u32| {
                counter.fetch_add(1, Ordering::Relaxed);
                thread::sleep(Duration::from_millis(20));
            }),
        )
        .unwrap();
        for n in 0..100 {
            pool.submit(n);
        }
        thread::sleep(Duration::from_millis(30));
        pool.shutdown_now().unwrap();
        assert!(cancel.is_cancelled());
        assert!(ran.load(Ordering::Relaxed) < 100);
    }

    #[test]
    fn test_panicking_worker_reported() {
        let pool = WorkerPool::spawn(
            "test",
            2,
            CancelToken::new(),
            Arc::new(|n: u32| assert!(n != 3, "boom")),
        )
        .unwrap();
        for n in 0..5 {
            pool.submit(n);
        }
        assert!(matches!(pool.join(), Err(ScanError::Pool(_))));
    }
}
