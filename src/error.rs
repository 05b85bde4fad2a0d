//! Error types for the ringpool crate.

/// Result type alias for ringpool operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by queue construction, task submission, and task
/// execution.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Queue construction received a capacity that is below 2 or not a
    /// power of two.
    #[error("queue capacity must be a power of two of at least 2, got {0}")]
    InvalidCapacity(usize),

    /// The task queue was full at submit time. The producer decides
    /// whether to retry, back off, or drop the work.
    #[error("task queue is full")]
    QueueFull,

    /// Submit was called on a pool that is not in the running state.
    #[error("thread pool is not running")]
    NotRunning,

    /// The OS refused to create a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The task's callable panicked. Delivered through the task's handle;
    /// never propagated to other tasks or to the pool.
    #[error("task panicked: {0}")]
    TaskPanicked(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }
}
