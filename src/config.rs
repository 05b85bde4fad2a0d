use crate::error::{Error, Result};

/// Construction-time settings for a [`ThreadPool`](crate::pool::ThreadPool).
///
/// The pool width is fixed once the pool is built; there is no runtime
/// scaling.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads. `None` means one per logical CPU.
    pub num_threads: Option<usize>,
    /// Prefix for worker thread names; workers are named `{prefix}-{id}`.
    pub thread_name_prefix: String,
    /// Stack size for worker threads, in bytes.
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            thread_name_prefix: "ringpool-worker".to_string(),
            stack_size: Some(2 * 1024 * 1024),
        }
    }
}

impl PoolConfig {
    /// Start building a config.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    /// Validate the settings without building anything.
    pub fn validate(&self) -> Result<()> {
        if let Some(n) = self.num_threads {
            if n == 0 {
                return Err(Error::config("num_threads must be > 0"));
            }
            if n > 1024 {
                return Err(Error::config("num_threads too large (max 1024)"));
            }
        }

        Ok(())
    }

    /// The worker count this config resolves to.
    pub fn worker_threads(&self) -> usize {
        self.num_threads.unwrap_or_else(num_cpus::get)
    }
}

/// Builder for [`PoolConfig`].
#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// New builder with default settings.
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    /// Set the number of worker threads.
    pub fn num_threads(mut self, n: usize) -> Self {
        self.config.num_threads = Some(n);
        self
    }

    /// Set the worker thread name prefix.
    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.thread_name_prefix = prefix.into();
        self
    }

    /// Set the worker thread stack size in bytes.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    /// Validate and produce the config.
    pub fn build(self) -> Result<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
