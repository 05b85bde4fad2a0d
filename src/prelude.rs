//! Convenient re-exports for common ringpool types.
//!
//! ```
//! use ringpool::prelude::*;
//! ```

pub use crate::config::{PoolConfig, PoolConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::pool::{PoolState, ThreadPool};
pub use crate::queue::MpmcQueue;
pub use crate::task::{TaskEnvelope, TaskHandle};
pub use crate::wait::{CondvarWait, FutexWait, SleepWait, SpinWait, WaitStrategy};
