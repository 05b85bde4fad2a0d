// worker thread loop
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::{AtomicPoolState, PoolState};
use crate::metrics::PoolMetrics;
use crate::queue::MpmcQueue;
use crate::task::TaskEnvelope;
use crate::wait::WaitStrategy;

/// Index of a worker within its pool.
pub type WorkerId = usize;

/// Per-worker execution counters.
#[derive(Debug)]
pub struct WorkerStats {
    /// Envelopes this worker has finished running.
    pub tasks_executed: AtomicU64,
    /// Of those, how many panicked.
    pub tasks_panicked: AtomicU64,
}

impl WorkerStats {
    fn new() -> Self {
        Self {
            tasks_executed: AtomicU64::new(0),
            tasks_panicked: AtomicU64::new(0),
        }
    }
}

pub(crate) struct Worker {
    pub id: WorkerId,
    pub stats: Arc<WorkerStats>,
}

impl Worker {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            stats: Arc::new(WorkerStats::new()),
        }
    }

    // Main loop. Dequeue is always tried before the state check so that
    // everything enqueued before shutdown was observed is drained; the
    // worker exits only once the pool is stopping, the queue is empty and
    // no peer is mid-task.
    pub fn run<M, W>(
        &self,
        queue: Arc<MpmcQueue<TaskEnvelope<M>>>,
        strategy: Arc<W>,
        state: Arc<AtomicPoolState>,
        active_tasks: Arc<AtomicUsize>,
        metrics: Arc<PoolMetrics>,
    ) where
        W: WaitStrategy,
    {
        loop {
            if let Some(envelope) = queue.pop() {
                strategy.reset();
                active_tasks.fetch_add(1, Ordering::AcqRel);
                self.execute(envelope, &metrics);
                active_tasks.fetch_sub(1, Ordering::AcqRel);
            } else if state.load(Ordering::Acquire) == PoolState::Stopping
                && active_tasks.load(Ordering::Acquire) == 0
            {
                break;
            } else {
                strategy.wait();
            }
        }
    }

    fn execute<M>(&self, envelope: TaskEnvelope<M>, metrics: &PoolMetrics) {
        let start = Instant::now();

        let result = catch_unwind(AssertUnwindSafe(|| envelope.invoke()));

        let duration_ns = start.elapsed().as_nanos() as u64;

        match result {
            Ok(()) => metrics.record_task_execution(duration_ns),
            Err(_) => {
                // The invocable already delivered the panic to its handle;
                // here it only needs to be kept away from the loop.
                self.stats.tasks_panicked.fetch_add(1, Ordering::Relaxed);
                metrics.record_task_panic();
            }
        }

        self.stats.tasks_executed.fetch_add(1, Ordering::Relaxed);
    }
}
