//! ringpool - bounded lock-free task execution
//!
//! A fixed-width pool of worker threads consuming from a shared, bounded,
//! lock-free multi-producer/multi-consumer queue built on sequenced ring
//! cells. Producers submit callables (optionally carrying metadata) and
//! get back a handle that resolves once the callable has run.
//!
//! # Quick Start
//!
//! ```no_run
//! use ringpool::prelude::*;
//! use std::sync::Arc;
//!
//! let queue: Arc<MpmcQueue<TaskEnvelope<()>>> = Arc::new(MpmcQueue::new(1024)?);
//! let pool = ThreadPool::new(queue)?;
//!
//! let handle = pool.submit(|| 2 + 2)?;
//! assert_eq!(handle.join()?, 4);
//! # Ok::<(), ringpool::Error>(())
//! ```
//!
//! # Features
//!
//! - **Bounded MPMC Ring**: lock-free, power-of-two capacity, strict
//!   per-position FIFO
//! - **Fixed Worker Pool**: drain-on-shutdown lifecycle, panic isolation
//! - **Pluggable Wait Strategies**: timed sleep, spin/pause/yield, futex
//!   park, mutex + condvar
//! - **Task Handles**: every submission resolves to the callable's value
//!   or its panic
//! - **Metrics**: execution counters and latency percentiles per pool

// Lint configuration
#![warn(missing_docs, missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod prelude;
pub mod queue;
pub mod task;
pub mod util;
pub mod wait;

// Re-export key types at crate root
pub use config::{PoolConfig, PoolConfigBuilder};
pub use error::{Error, Result};
pub use pool::{PoolState, ThreadPool};
pub use queue::MpmcQueue;
pub use task::{TaskEnvelope, TaskHandle};
pub use wait::{CondvarWait, FutexWait, SleepWait, SpinWait, WaitStrategy};
