//! # Workhorse Task Submission API
//!
//! Workhorse is a bounded, in-process worker pool. This crate holds the
//! interface that request-handling layers program against: the task and job
//! types, the result handle returned for every submission, the status and
//! shutdown report types, and the submission façade.
//!
//! ## Core Components
//!
//! - **Executor**: object-safe trait implemented by a concrete pool
//! - **ExecutorExt**: `submit`, `execute` and `submit_all`, written once on
//!   top of [`Executor::execute_job`]
//! - **ResultHandle**: single-resolution container for a task's value or failure
//! - **PoolStatus**: read-only snapshot of the pool counters
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use workhorse_api::{Executor, ExecutorExt};
//!
//! fn handle_request(executor: &dyn Executor) -> anyhow::Result<u64> {
//!     let handle = executor.submit(|| Ok(6 * 7));
//!     Ok(handle.wait()?)
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`errors`]: Task and executor error types
//! - [`executor`]: The `Executor` trait and the submission façade
//! - [`handle`]: Result handles and their producer half
//! - [`status`]: Status snapshots and shutdown reports
//! - [`types`]: Job and result type definitions

pub mod errors;
pub mod executor;
pub mod handle;
pub mod status;
pub mod types;

pub use errors::{ExecutorError, TaskError};
pub use executor::{Admission, Executor, ExecutorExt};
pub use handle::{Completer, ResultHandle};
pub use status::{PoolStatus, ShutdownPhase, ShutdownReport};
pub use types::{job, FnJob, Job, JobOutcome, Runnable, TaskResult};
