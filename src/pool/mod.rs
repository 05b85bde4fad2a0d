//! Fixed-width worker pool over a shared MPMC ring.
//!
//! The pool spawns its workers once at construction and never resizes.
//! Submission enqueues a [`TaskEnvelope`] and nudges the wait strategy;
//! each worker drains the queue, blocking through the strategy when idle.
//! Shutdown stops intake, wakes every worker and joins them after the
//! queue has drained.

pub mod worker;

use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::metrics::PoolMetrics;
use crate::queue::MpmcQueue;
use crate::task::{handle_pair, package, TaskEnvelope, TaskHandle};
use crate::wait::{FutexWait, WaitStrategy};

pub use worker::{WorkerId, WorkerStats};

use worker::Worker;

/// Lifecycle of a [`ThreadPool`].
///
/// States only ever advance: `Initializing → Running → Stopping →
/// Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PoolState {
    /// Workers are being launched.
    Initializing = 0,
    /// Accepting submissions.
    Running = 1,
    /// Draining the queue; no new submissions.
    Stopping = 2,
    /// All workers have exited.
    Stopped = 3,
}

pub(crate) struct AtomicPoolState(AtomicU8);

impl AtomicPoolState {
    fn new(state: PoolState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    pub(crate) fn load(&self, order: Ordering) -> PoolState {
        match self.0.load(order) {
            0 => PoolState::Initializing,
            1 => PoolState::Running,
            2 => PoolState::Stopping,
            3 => PoolState::Stopped,
            state => unreachable!("invalid pool state {}", state),
        }
    }

    fn store(&self, state: PoolState, order: Ordering) {
        self.0.store(state as u8, order);
    }
}

struct WorkerHandle {
    id: WorkerId,
    stats: Arc<WorkerStats>,
    thread: Option<JoinHandle<()>>,
}

/// A fixed pool of worker threads driven by a shared [`MpmcQueue`].
///
/// Generic over the per-task metadata type `M` and the wait strategy `W`
/// shared by all workers. The queue is borrowed through an `Arc`, so
/// producers may also hold it directly.
///
/// Dropping the pool shuts it down: intake stops, already-enqueued work is
/// drained, and every worker is joined.
pub struct ThreadPool<M: Send + 'static = (), W: WaitStrategy = FutexWait> {
    queue: Arc<MpmcQueue<TaskEnvelope<M>>>,
    strategy: Arc<W>,
    state: Arc<AtomicPoolState>,
    active_tasks: Arc<AtomicUsize>,
    metrics: Arc<PoolMetrics>,
    workers: Vec<WorkerHandle>,
}

impl<M: Send + 'static> ThreadPool<M, FutexWait> {
    /// Build a pool over `queue` with default config and the futex wait
    /// strategy.
    pub fn new(queue: Arc<MpmcQueue<TaskEnvelope<M>>>) -> Result<Self> {
        Self::with_strategy(queue, PoolConfig::default(), FutexWait::new())
    }
}

impl<M: Send + 'static, W: WaitStrategy> ThreadPool<M, W> {
    /// Build a pool with explicit config and a default-constructed
    /// strategy.
    pub fn with_config(queue: Arc<MpmcQueue<TaskEnvelope<M>>>, config: PoolConfig) -> Result<Self>
    where
        W: Default,
    {
        Self::with_strategy(queue, config, W::default())
    }

    /// Build a pool with explicit config and wait strategy.
    ///
    /// Spawns every worker before flipping the pool to
    /// [`PoolState::Running`]. If the OS refuses a thread, the workers
    /// launched so far are torn down again and the error is returned.
    pub fn with_strategy(
        queue: Arc<MpmcQueue<TaskEnvelope<M>>>,
        config: PoolConfig,
        strategy: W,
    ) -> Result<Self> {
        config.validate()?;

        let strategy = Arc::new(strategy);
        let state = Arc::new(AtomicPoolState::new(PoolState::Initializing));
        let active_tasks = Arc::new(AtomicUsize::new(0));
        let metrics = Arc::new(PoolMetrics::new());

        let num_threads = config.worker_threads();
        let mut workers: Vec<WorkerHandle> = Vec::with_capacity(num_threads);

        for id in 0..num_threads {
            let worker = Worker::new(id);
            let worker_id = worker.id;
            let stats = worker.stats.clone();

            let queue = queue.clone();
            let strategy_for_worker = strategy.clone();
            let state_for_worker = state.clone();
            let active_tasks = active_tasks.clone();
            let metrics = metrics.clone();

            let mut builder =
                thread::Builder::new().name(format!("{}-{}", config.thread_name_prefix, id));
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let spawned = builder.spawn(move || {
                worker.run(
                    queue,
                    strategy_for_worker,
                    state_for_worker,
                    active_tasks,
                    metrics,
                )
            });

            match spawned {
                Ok(thread) => workers.push(WorkerHandle {
                    id: worker_id,
                    stats,
                    thread: Some(thread),
                }),
                Err(err) => {
                    // Unwind the workers launched so far before
                    // propagating.
                    state.store(PoolState::Stopping, Ordering::Release);
                    strategy.notify_all();
                    for handle in &mut workers {
                        if let Some(thread) = handle.thread.take() {
                            let _ = thread.join();
                        }
                    }
                    state.store(PoolState::Stopped, Ordering::Release);
                    return Err(Error::Spawn(err));
                }
            }
        }

        state.store(PoolState::Running, Ordering::Release);

        Ok(Self {
            queue,
            strategy,
            state,
            active_tasks,
            metrics,
            workers,
        })
    }

    /// Submit a callable with empty metadata.
    ///
    /// See [`submit_with`](Self::submit_with).
    pub fn submit<F, R>(&self, func: F) -> Result<TaskHandle<R>>
    where
        M: Default,
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.submit_with(M::default(), func)
    }

    /// Submit a callable together with per-task metadata.
    ///
    /// Fails with [`Error::NotRunning`] unless the pool is running and
    /// with [`Error::QueueFull`] when the queue has no room; the producer
    /// decides whether to retry. On success the returned handle resolves
    /// to the callable's value once a worker has run it.
    pub fn submit_with<F, R>(&self, metadata: M, func: F) -> Result<TaskHandle<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.state.load(Ordering::Acquire) != PoolState::Running {
            return Err(Error::NotRunning);
        }

        let (handle, slot) = handle_pair();
        let envelope = TaskEnvelope::new(metadata, package(func, slot));

        if self.queue.push(envelope).is_err() {
            self.metrics.record_rejection();
            return Err(Error::QueueFull);
        }

        self.metrics.record_submission();
        self.strategy.notify_one();
        Ok(handle)
    }

    /// Stop intake, drain the queue, and join every worker.
    ///
    /// Idempotent: only the first call on a running pool does anything.
    pub fn shutdown(&mut self) {
        if self.state.load(Ordering::Acquire) != PoolState::Running {
            return;
        }

        self.state.store(PoolState::Stopping, Ordering::Release);
        self.strategy.notify_all();

        for handle in &mut self.workers {
            if let Some(thread) = handle.thread.take() {
                let _ = thread.join();
            }
        }

        self.state.store(PoolState::Stopped, Ordering::Release);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PoolState {
        self.state.load(Ordering::Acquire)
    }

    /// Number of envelopes currently executing (not merely dequeued).
    pub fn active_tasks(&self) -> usize {
        self.active_tasks.load(Ordering::Acquire)
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.workers.len()
    }

    /// Pool-wide execution counters.
    pub fn metrics(&self) -> &PoolMetrics {
        &self.metrics
    }

    /// Per-worker counters, keyed by [`WorkerId`].
    pub fn worker_stats(&self) -> Vec<(WorkerId, Arc<WorkerStats>)> {
        self.workers
            .iter()
            .map(|w| (w.id, w.stats.clone()))
            .collect()
    }
}

impl<M: Send + 'static, W: WaitStrategy> Drop for ThreadPool<M, W> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<M: Send + 'static, W: WaitStrategy> fmt::Debug for ThreadPool<M, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("state", &self.state())
            .field("num_threads", &self.num_threads())
            .field("active_tasks", &self.active_tasks())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wait::{CondvarWait, SleepWait};
    use parking_lot::{Condvar, Mutex};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn queue_of<M: Send + 'static>(capacity: usize) -> Arc<MpmcQueue<TaskEnvelope<M>>> {
        Arc::new(MpmcQueue::new(capacity).unwrap())
    }

    #[test]
    fn test_counter_tasks_all_execute() {
        let queue = queue_of::<()>(128);
        let mut pool = ThreadPool::new(queue).unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..10)
            .map(|_| {
                let counter = counter.clone();
                pool.submit(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap()
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        pool.shutdown();

        assert_eq!(counter.load(Ordering::Relaxed), 10);
        assert_eq!(pool.metrics().tasks_executed(), 10);
    }

    #[test]
    fn test_handle_resolves_to_return_value() {
        let queue = queue_of::<()>(128);
        let mut pool = ThreadPool::new(queue).unwrap();

        let handle = pool.submit(|| 42).unwrap();
        assert_eq!(handle.join().unwrap(), 42);

        pool.shutdown();
    }

    #[test]
    fn test_metadata_travels_with_task() {
        #[derive(Debug, Default)]
        struct Priority(#[allow(dead_code)] i32);

        let queue = queue_of::<Priority>(128);
        let pool = ThreadPool::new(queue).unwrap();

        let handle = pool.submit_with(Priority(3), || "done").unwrap();
        assert_eq!(handle.join().unwrap(), "done");
    }

    #[test]
    fn test_shutdown_drains_pending_work() {
        let queue = queue_of::<()>(128);
        let mut pool =
            ThreadPool::<(), SleepWait>::with_config(queue, PoolConfig::default()).unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..50 {
            let counter = counter.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        }

        // No sleep: shutdown itself must wait for the queue to drain.
        pool.shutdown();
        assert_eq!(counter.load(Ordering::Relaxed), 50);
        assert_eq!(pool.state(), PoolState::Stopped);
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let queue = queue_of::<()>(8);
        let mut pool = ThreadPool::new(queue).unwrap();
        pool.shutdown();

        match pool.submit(|| ()) {
            Err(Error::NotRunning) => {}
            other => panic!("expected NotRunning, got {:?}", other),
        }
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let queue = queue_of::<()>(8);
        let mut pool = ThreadPool::new(queue).unwrap();

        pool.shutdown();
        assert_eq!(pool.state(), PoolState::Stopped);
        pool.shutdown();
        pool.shutdown();
        assert_eq!(pool.state(), PoolState::Stopped);
    }

    #[test]
    fn test_full_queue_rejects_submission() {
        struct Gate {
            open: Mutex<bool>,
            cond: Condvar,
        }

        impl Gate {
            fn release(&self) {
                *self.open.lock() = true;
                self.cond.notify_all();
            }

            fn block(&self) {
                let mut open = self.open.lock();
                while !*open {
                    self.cond.wait(&mut open);
                }
            }
        }

        let queue = queue_of::<()>(2);
        let config = PoolConfig::builder().num_threads(1).build().unwrap();
        let mut pool = ThreadPool::<(), CondvarWait>::with_config(queue, config).unwrap();

        let gate = Arc::new(Gate {
            open: Mutex::new(false),
            cond: Condvar::new(),
        });
        let started = Arc::new(AtomicUsize::new(0));

        // First task occupies the lone worker; wait until it is running so
        // the next submissions stay queued.
        let blocker = {
            let gate = gate.clone();
            let started = started.clone();
            pool.submit(move || {
                started.fetch_add(1, Ordering::Release);
                gate.block();
            })
            .unwrap()
        };
        while started.load(Ordering::Acquire) == 0 {
            thread::yield_now();
        }

        let queued: Vec<_> = (0..2)
            .map(|_| {
                let gate = gate.clone();
                pool.submit(move || gate.block()).unwrap()
            })
            .collect();

        match pool.submit(|| ()) {
            Err(Error::QueueFull) => {}
            other => panic!("expected QueueFull, got {:?}", other),
        }
        assert_eq!(pool.metrics().submissions_rejected(), 1);

        gate.release();
        blocker.join().unwrap();
        for handle in queued {
            handle.join().unwrap();
        }
        pool.shutdown();
    }

    #[test]
    fn test_panicking_task_is_isolated() {
        let queue = queue_of::<()>(128);
        let mut pool = ThreadPool::new(queue).unwrap();

        let failing = pool.submit(|| panic!("task failure")).unwrap();
        match failing.join() {
            Err(Error::TaskPanicked(msg)) => assert_eq!(msg, "task failure"),
            other => panic!("expected TaskPanicked, got {:?}", other),
        }

        // The pool keeps serving after a task panic.
        let ok = pool.submit(|| 7).unwrap();
        assert_eq!(ok.join().unwrap(), 7);

        pool.shutdown();
        assert_eq!(pool.metrics().tasks_panicked(), 1);
        assert_eq!(pool.metrics().tasks_executed(), 2);
    }

    #[test]
    fn test_worker_stats_account_for_all_tasks() {
        let queue = queue_of::<()>(128);
        let config = PoolConfig::builder().num_threads(4).build().unwrap();
        let mut pool = ThreadPool::<(), FutexWait>::with_config(queue, config).unwrap();

        let handles: Vec<_> = (0..40).map(|i| pool.submit(move || i).unwrap()).collect();
        for handle in handles {
            handle.join().unwrap();
        }
        pool.shutdown();

        let stats = pool.worker_stats();
        assert_eq!(stats.len(), 4);
        let total: u64 = stats
            .iter()
            .map(|(_, s)| s.tasks_executed.load(Ordering::Relaxed))
            .sum();
        assert_eq!(total, 40);
    }

    #[test]
    fn test_drop_shuts_down() {
        let queue = queue_of::<()>(128);
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let pool = ThreadPool::new(queue).unwrap();
            for _ in 0..20 {
                let counter = counter.clone();
                pool.submit(move || {
                    counter.fetch_add(1, Ordering::Relaxed);
                })
                .unwrap();
            }
            // Pool dropped here while work may still be queued.
        }

        assert_eq!(counter.load(Ordering::Relaxed), 20);
    }
}
