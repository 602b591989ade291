use crate::errors::TaskError;

/// Result of a task as observed through its handle.
pub type TaskResult<T> = Result<T, TaskError>;

/// A type-erased unit of work owned by the pool while it waits and runs.
pub type Job = Box<dyn Runnable>;

/// How a job finished, reported back to the pool's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed,
}

/// Work the pool can run once.
///
/// A job is either run exactly once or rejected exactly once; both consume
/// it. Rejection happens when the pool is closed at submission time or when
/// a queued job is discarded by a forced shutdown.
pub trait Runnable: Send + 'static {
    /// Run the work on the current thread.
    fn run(self: Box<Self>) -> JobOutcome;

    /// Give up on the work without running it.
    fn reject(self: Box<Self>, reason: TaskError) {
        let _ = reason;
    }
}

/// Adapter that turns a plain closure into a [`Runnable`].
///
/// Panics escape `run` and are captured by the worker running the job.
pub struct FnJob<F>(F);

impl<F> Runnable for FnJob<F>
where
    F: FnOnce() + Send + 'static,
{
    fn run(self: Box<Self>) -> JobOutcome {
        (self.0)();
        JobOutcome::Succeeded
    }
}

/// Box a closure as a [`Job`].
pub fn job<F>(f: F) -> Job
where
    F: FnOnce() + Send + 'static,
{
    Box::new(FnJob(f))
}
