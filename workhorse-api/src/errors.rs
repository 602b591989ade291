//! # Task and Executor Error Types
//!
//! Every failure a caller can observe from the pool is a [`TaskError`] carried
//! by a result handle. Submission itself never fails; a saturated pool runs the
//! task on the caller instead, and a closed pool resolves the handle with
//! [`TaskError::Rejected`].
//!
//! `TaskError` is `Clone` so that the same failure can be peeked by several
//! observers of a handle. Causes are therefore kept behind an `Arc`.

use std::any::Any;
use std::error::Error as StdError;
use std::sync::Arc;

use thiserror::Error;

/// Shared, clonable error cause.
pub type SharedCause = Arc<dyn StdError + Send + Sync + 'static>;

/// Failure of a single submitted task.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    /// The task ran and returned an error.
    #[error("Task failed: {cause}")]
    Failed {
        #[source]
        cause: SharedCause,
    },

    /// The task panicked while running.
    #[error("Task panicked: {message}")]
    Panicked { message: String },

    /// The task was submitted after the executor stopped accepting work.
    #[error("Task rejected: executor is shut down")]
    Rejected,

    /// The task was dropped before it could produce a result.
    #[error("Task abandoned before completion")]
    Abandoned,

    /// A failure wrapped with caller supplied context.
    #[error("{context}: {source}")]
    Custom {
        context: String,
        #[source]
        source: Arc<TaskError>,
    },
}

impl TaskError {
    /// Wrap an error returned by a task.
    pub fn failed<E>(error: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        let error: anyhow::Error = error.into();
        let boxed: Box<dyn StdError + Send + Sync + 'static> = error.into();
        TaskError::Failed {
            cause: Arc::from(boxed),
        }
    }

    /// Build a failure from a caught panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "non-string panic payload".to_string(),
            },
        };
        TaskError::Panicked { message }
    }

    /// Wrap this failure with additional context.
    pub fn context<C>(self, context: C) -> Self
    where
        C: Into<String>,
    {
        TaskError::Custom {
            context: context.into(),
            source: Arc::new(self),
        }
    }

    /// Strip any context layers and return the innermost failure.
    pub fn root(&self) -> &TaskError {
        match self {
            TaskError::Custom { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the task never ran (rejected or abandoned).
    pub fn is_not_run(&self) -> bool {
        matches!(self.root(), TaskError::Rejected | TaskError::Abandoned)
    }
}

/// Errors raised while building or driving an executor.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Invalid executor configuration: {0}")]
    Config(String),
    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
    #[error("Termination signal error: {0}")]
    Signal(String),
}
