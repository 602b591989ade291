//! # Executor Interface and Submission Façade
//!
//! [`Executor`] is the object-safe seam between the request-handling layer and
//! a concrete pool. It deals only in type-erased [`Job`]s. [`ExecutorExt`]
//! adds the typed façade on top: every submission gets a [`ResultHandle`],
//! failures are logged with their cause and resolved as wrapped
//! [`TaskError`]s, and batches can be joined behind a single handle.
//!
//! The façade is implemented once for every `Executor`, including
//! `dyn Executor`, so all pools share the same failure contract.

use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use crate::errors::TaskError;
use crate::handle::{Completer, ResultHandle};
use crate::status::{PoolStatus, ShutdownReport};
use crate::types::{Job, JobOutcome, Runnable};

/// Which branch of the admission policy took a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A new core thread was started to run the job
    Started,
    /// The job was placed in the queue
    Queued,
    /// A thread beyond the core count was started to run the job
    StartedOverflow,
    /// The pool was saturated and the submitting thread ran the job
    CallerRan,
    /// The executor no longer accepts work; the job was rejected
    Rejected,
}

/// Common interface for all executors.
pub trait Executor: Send + Sync {
    /// Admit a job. Never fails: a saturated pool runs the job on the
    /// calling thread, a closed pool rejects it through [`Runnable::reject`].
    fn execute_job(&self, job: Job) -> Admission;

    /// Read a snapshot of the pool counters without blocking.
    fn status(&self) -> PoolStatus;

    /// Stop accepting work and wind the pool down. Idempotent.
    fn shutdown(&self) -> ShutdownReport;

    /// Whether the executor has stopped accepting work.
    fn is_shutdown(&self) -> bool;
}

/// A typed task paired with the completer of its handle.
struct TaskJob<T, F> {
    task: F,
    completer: Completer<T>,
}

impl<T, F> Runnable for TaskJob<T, F>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    fn run(self: Box<Self>) -> JobOutcome {
        let TaskJob { task, completer } = *self;

        let result = match panic::catch_unwind(AssertUnwindSafe(task)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(cause)) => Err(TaskError::failed(cause)),
            Err(payload) => Err(TaskError::from_panic(payload)),
        };

        match result {
            Ok(value) => {
                completer.succeed(value);
                JobOutcome::Succeeded
            }
            Err(failure) => {
                error!(error = %failure, cause = ?failure, "Task failed");
                completer.fail(failure);
                JobOutcome::Failed
            }
        }
    }

    fn reject(self: Box<Self>, reason: TaskError) {
        self.completer.fail(reason);
    }
}

/// Typed submission façade available on every [`Executor`].
pub trait ExecutorExt: Executor {
    /// Submit a value-producing task.
    ///
    /// Errors returned by the task and panics raised inside it resolve the
    /// handle with a [`TaskError`]; nothing escapes `submit` itself.
    fn submit<T, F>(&self, task: F) -> ResultHandle<T>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    {
        let (completer, handle) = ResultHandle::pair();
        self.execute_job(Box::new(TaskJob { task, completer }));
        handle
    }

    /// Submit a side-effect-only task.
    fn execute<F>(&self, task: F) -> ResultHandle<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(move || {
            task();
            Ok(())
        })
    }

    /// Submit every task in order and resolve once all of them have resolved.
    ///
    /// Order only affects submission, not completion. The returned handle
    /// resolves successfully even when constituents fail; submit tasks
    /// individually and join them with [`ResultHandle::all`] when failure
    /// attribution matters.
    fn submit_all<T, F, I>(&self, tasks: I) -> ResultHandle<()>
    where
        T: Send + 'static,
        F: FnOnce() -> anyhow::Result<T> + Send + 'static,
        I: IntoIterator<Item = F>,
    {
        let handles: Vec<ResultHandle<T>> = tasks.into_iter().map(|task| self.submit(task)).collect();
        ResultHandle::<()>::all(&handles)
    }
}

impl<E: Executor + ?Sized> ExecutorExt for E {}
