//! Pluggable policies for how idle workers wait and how producers wake
//! them.
//!
//! A pool shares one strategy instance across all of its workers. Producers
//! call [`notify_one`](WaitStrategy::notify_one) after every successful
//! enqueue and [`notify_all`](WaitStrategy::notify_all) at shutdown; a
//! worker calls [`wait`](WaitStrategy::wait) when it finds the queue empty
//! and [`reset`](WaitStrategy::reset) right after a successful dequeue.
//!
//! The polling strategies ([`SleepWait`], [`SpinWait`]) ignore
//! notifications: the enqueue that precedes every notification is visible
//! to the worker's next poll, so correctness only costs one polling
//! interval of latency. The signaling strategies ([`FutexWait`],
//! [`CondvarWait`]) wake workers promptly at the price of producer-side
//! overhead.

use std::sync::atomic::{AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::util::Backoff;

/// How idle workers block and how producers signal new work.
///
/// All operations are infallible and take `&self`; one instance is shared
/// by every worker of a pool.
pub trait WaitStrategy: Send + Sync + 'static {
    /// Called by a worker that observed an empty queue. May block, spin,
    /// or sleep.
    fn wait(&self);

    /// Called by a producer after a successful enqueue. Best-effort wake
    /// of at most one waiter.
    fn notify_one(&self);

    /// Called at shutdown. Releases every current waiter, and keeps
    /// subsequent waits from blocking until the next reset.
    fn notify_all(&self);

    /// Called by a worker right after a successful dequeue, so the next
    /// wait starts fresh.
    fn reset(&self);
}

/// Fixed-interval sleep. Workers poll the queue once per interval;
/// notifications are no-ops.
#[derive(Debug)]
pub struct SleepWait {
    interval: Duration,
}

impl SleepWait {
    /// Sleep for `interval` on every wait.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for SleepWait {
    fn default() -> Self {
        Self::new(Duration::from_millis(10))
    }
}

impl WaitStrategy for SleepWait {
    fn wait(&self) {
        thread::sleep(self.interval);
    }

    fn notify_one(&self) {}

    fn notify_all(&self) {}

    fn reset(&self) {}
}

/// Busy-wait progression: pure spins first, then CPU pause hints, then OS
/// yields. Notifications are no-ops; latency depends on scheduler
/// fairness.
#[derive(Debug, Default)]
pub struct SpinWait {
    backoff: Backoff,
}

impl SpinWait {
    /// `spins` pure-spin steps, then `pauses` pause-hint steps, then
    /// yields.
    pub fn new(spins: usize, pauses: usize) -> Self {
        Self {
            backoff: Backoff::new(spins, pauses),
        }
    }
}

impl WaitStrategy for SpinWait {
    fn wait(&self) {
        self.backoff.spin();
    }

    fn notify_one(&self) {}

    fn notify_all(&self) {}

    fn reset(&self) {
        self.backoff.reset();
    }
}

/// Parks on an atomic flag with futex-style wait/wake.
///
/// The flag is sticky: once notified it stays set until the next
/// [`reset`](WaitStrategy::reset), so a worker that checks the queue after
/// a missed wake-up falls straight through its next wait. That is also
/// what makes the shutdown loop finite: `notify_all` leaves the flag set
/// and every subsequent wait returns immediately.
#[derive(Debug)]
pub struct FutexWait {
    notified: AtomicU32,
}

impl FutexWait {
    pub fn new() -> Self {
        Self {
            notified: AtomicU32::new(0),
        }
    }
}

impl Default for FutexWait {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for FutexWait {
    fn wait(&self) {
        // Blocks while the flag is still 0; returns on wake or spurious
        // wake-up. The worker loop re-checks the queue either way.
        atomic_wait::wait(&self.notified, 0);
    }

    fn notify_one(&self) {
        self.notified.store(1, Ordering::Release);
        atomic_wait::wake_one(&self.notified);
    }

    fn notify_all(&self) {
        self.notified.store(1, Ordering::Release);
        atomic_wait::wake_all(&self.notified);
    }

    fn reset(&self) {
        self.notified.store(0, Ordering::Relaxed);
    }
}

/// Mutex plus condition variable predicated on a notified flag.
#[derive(Debug, Default)]
pub struct CondvarWait {
    notified: Mutex<bool>,
    cond: Condvar,
}

impl CondvarWait {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WaitStrategy for CondvarWait {
    fn wait(&self) {
        let mut notified = self.notified.lock();
        while !*notified {
            self.cond.wait(&mut notified);
        }
    }

    fn notify_one(&self) {
        let mut notified = self.notified.lock();
        *notified = true;
        self.cond.notify_one();
    }

    fn notify_all(&self) {
        let mut notified = self.notified.lock();
        *notified = true;
        self.cond.notify_all();
    }

    fn reset(&self) {
        let mut notified = self.notified.lock();
        *notified = false;
    }
}
