use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_FORCE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_THREAD_NAME_PREFIX: &str = "workhorse-";

// Environment overrides read by `ExecutorConfig::from_env`.
pub const ENV_CORE_THREADS: &str = "WORKHORSE_CORE_THREADS";
pub const ENV_MAX_THREADS: &str = "WORKHORSE_MAX_THREADS";
pub const ENV_QUEUE_CAPACITY: &str = "WORKHORSE_QUEUE_CAPACITY";
pub const ENV_KEEP_ALIVE_SECS: &str = "WORKHORSE_KEEP_ALIVE_SECS";
pub const ENV_THREAD_PREFIX: &str = "WORKHORSE_THREAD_PREFIX";
pub const ENV_DRAIN_TIMEOUT_SECS: &str = "WORKHORSE_DRAIN_TIMEOUT_SECS";
pub const ENV_FORCE_TIMEOUT_SECS: &str = "WORKHORSE_FORCE_TIMEOUT_SECS";

/// Errors in executor configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_threads must be at least 1")]
    ZeroMaxThreads,
    #[error("core_threads ({core}) must not exceed max_threads ({max})")]
    CoreExceedsMax { core: usize, max: usize },
    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,
    #[error("thread_name_prefix must not be empty")]
    EmptyThreadPrefix,
    #[error("thread_name_prefix must not contain null bytes")]
    NullInThreadPrefix,
    #[error("Invalid value {value:?} for {key}")]
    InvalidEnv { key: String, value: String },
}

// --- Pool Configuration ---

/// Sizing of the worker pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Threads started eagerly by submissions before any work is queued.
    pub core_threads: usize,

    /// Upper bound on live worker threads.
    pub max_threads: usize,

    /// Fixed capacity of the pending-work queue.
    pub queue_capacity: usize,

    /// How long a thread above the core count may stay idle before retiring.
    pub keep_alive: Duration,

    /// Worker threads are named `<prefix><n>` with `n` starting at 1.
    pub thread_name_prefix: String,

    /// Stack size for worker threads; platform default when unset.
    pub stack_size: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let core_threads = num_cpus::get().max(1);
        Self {
            core_threads,
            max_threads: core_threads.saturating_mul(2),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            keep_alive: DEFAULT_KEEP_ALIVE,
            thread_name_prefix: DEFAULT_THREAD_NAME_PREFIX.to_string(),
            stack_size: None,
        }
    }
}

impl PoolConfig {
    /// Set the core count; the max becomes twice the core count, capped at `usize::MAX`.
    pub fn with_core_threads(mut self, core_threads: usize) -> Self {
        self.core_threads = core_threads;
        self.max_threads = core_threads.saturating_mul(2).max(1);
        self
    }

    pub fn with_max_threads(mut self, max_threads: usize) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Set both bounds at once.
    pub fn with_threads(mut self, core_threads: usize, max_threads: usize) -> Self {
        self.core_threads = core_threads;
        self.max_threads = max_threads;
        self
    }

    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn with_thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == 0 {
            return Err(ConfigError::ZeroMaxThreads);
        }
        if self.core_threads > self.max_threads {
            return Err(ConfigError::CoreExceedsMax {
                core: self.core_threads,
                max: self.max_threads,
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.thread_name_prefix.is_empty() {
            return Err(ConfigError::EmptyThreadPrefix);
        }
        if self.thread_name_prefix.as_bytes().contains(&0) {
            return Err(ConfigError::NullInThreadPrefix);
        }
        Ok(())
    }
}

// --- Shutdown Configuration ---

/// Bounds on the two shutdown waits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShutdownConfig {
    /// How long queued and running tasks get to finish naturally.
    pub drain_timeout: Duration,

    /// How long interrupted workers get to exit after a forced shutdown.
    pub force_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            force_timeout: DEFAULT_FORCE_TIMEOUT,
        }
    }
}

impl ShutdownConfig {
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    pub fn with_force_timeout(mut self, timeout: Duration) -> Self {
        self.force_timeout = timeout;
        self
    }

    /// Longest time the shutdown sequence can wait in total.
    pub fn worst_case(&self) -> Duration {
        self.drain_timeout.saturating_add(self.force_timeout)
    }
}

// --- Executor Configuration ---

/// Configuration for a `TaskExecutor`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutorConfig {
    pub pool: PoolConfig,
    pub shutdown: ShutdownConfig,
}

impl ExecutorConfig {
    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownConfig) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Defaults overridden by `WORKHORSE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each `WORKHORSE_*` key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(core) = parse::<usize, _>(&lookup, ENV_CORE_THREADS)? {
            config.pool = config.pool.with_core_threads(core);
        }
        if let Some(max) = parse::<usize, _>(&lookup, ENV_MAX_THREADS)? {
            config.pool.max_threads = max;
        }
        if let Some(capacity) = parse::<usize, _>(&lookup, ENV_QUEUE_CAPACITY)? {
            config.pool.queue_capacity = capacity;
        }
        if let Some(secs) = parse::<u64, _>(&lookup, ENV_KEEP_ALIVE_SECS)? {
            config.pool.keep_alive = Duration::from_secs(secs);
        }
        if let Some(prefix) = lookup(ENV_THREAD_PREFIX) {
            config.pool.thread_name_prefix = prefix;
        }
        if let Some(secs) = parse::<u64, _>(&lookup, ENV_DRAIN_TIMEOUT_SECS)? {
            config.shutdown.drain_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse::<u64, _>(&lookup, ENV_FORCE_TIMEOUT_SECS)? {
            config.shutdown.force_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pool.validate()
    }
}

fn parse<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv {
                key: key.to_string(),
                value: raw,
            }),
    }
}
