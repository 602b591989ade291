// Workhorse Worker Pool Implementation
//
// This crate implements the Workhorse task submission API on a bounded
// pool of named OS threads with caller-runs backpressure and a two-phase
// shutdown.

pub mod config;
pub mod executor;
pub mod logging;
pub mod shutdown;
pub mod signal;
pub mod thread;

// Re-export commonly used types
pub use config::{ConfigError, ExecutorConfig, PoolConfig, ShutdownConfig};
pub use executor::TaskExecutor;
pub use shutdown::{ShutdownCoordinator, ShutdownLatch};
pub use signal::{CtrlC, ManualSignal, SignalError, SignalTrigger, TerminationSignal};
pub use thread::{NamedThreadFactory, ThreadFactory, WorkerPool, is_interrupted};
pub use workhorse_api::{
    Admission, Executor, ExecutorError, ExecutorExt, Job, JobOutcome, PoolStatus, ResultHandle,
    Runnable, ShutdownPhase, ShutdownReport, TaskError, TaskResult, job,
};
