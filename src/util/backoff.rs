use std::hint::spin_loop;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Staged idle progression shared by every thread polling the same spot:
/// the first `spin_limit` steps return immediately (the caller's poll loop
/// is the spin), the next `pause_limit` steps issue a CPU pause hint, and
/// everything past that yields to the scheduler.
///
/// The step counter is atomic because a single instance is shared across
/// all workers of a pool.
#[derive(Debug)]
pub struct Backoff {
    spin_limit: usize,
    pause_limit: usize,
    step: AtomicUsize,
}

impl Backoff {
    pub const DEFAULT_SPIN_LIMIT: usize = 64;
    pub const DEFAULT_PAUSE_LIMIT: usize = 64;

    pub fn new(spin_limit: usize, pause_limit: usize) -> Self {
        Self {
            spin_limit,
            pause_limit,
            step: AtomicUsize::new(0),
        }
    }

    pub fn reset(&self) {
        self.step.store(0, Ordering::Relaxed);
    }

    pub fn spin(&self) {
        let step = self.step.fetch_add(1, Ordering::Relaxed);

        if step < self.spin_limit {
            // pure spin: return and let the caller poll again
        } else if step < self.spin_limit + self.pause_limit {
            spin_loop();
        } else {
            thread::yield_now();
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SPIN_LIMIT, Self::DEFAULT_PAUSE_LIMIT)
    }
}
