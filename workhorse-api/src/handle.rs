//! # Result Handles
//!
//! A [`ResultHandle`] is created for every submitted task and is resolved
//! exactly once by whoever runs the task, through the matching
//! [`Completer`]. The result travels over a one-slot flume channel: the
//! completer sends it and the handle receives it. Single resolution is
//! enforced by ownership, since `Completer` methods consume it, and a
//! completer dropped without completing sends [`TaskError::Abandoned`] so no
//! waiter is left hanging.
//!
//! ## Observing a handle
//! - `wait` blocks the calling thread and takes the result
//! - `wait_timeout` gives the handle back if the deadline passes first
//! - `.await` resolves the handle from async code
//! - `is_resolved` and `failure` inspect it without consuming it
//!
//! ## Composition
//! `map_err` and `context` chain failure transformations. They are applied
//! lazily, when the failure is read, so the chain costs nothing on success.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use flume::r#async::RecvFut;
use flume::{Receiver, RecvTimeoutError, Sender};
use futures::future::{FusedFuture, FutureExt};

use crate::errors::TaskError;
use crate::types::TaskResult;

type Listener = Box<dyn FnOnce() + Send>;
type ErrorMapper = Arc<dyn Fn(TaskError) -> TaskError + Send + Sync>;

// Callbacks to run once the result has been sent.
#[derive(Default)]
struct Listeners {
    fired: bool,
    pending: Vec<Listener>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn on_resolved(listeners: &Mutex<Listeners>, listener: Listener) {
    {
        let mut listeners = lock(listeners);
        if !listeners.fired {
            listeners.pending.push(listener);
            return;
        }
    }
    listener();
}

/// Producer half of a [`ResultHandle`].
pub struct Completer<T> {
    sender: Option<Sender<TaskResult<T>>>,
    listeners: Arc<Mutex<Listeners>>,
}

impl<T> Completer<T> {
    /// Resolve the handle with the given result.
    pub fn complete(mut self, result: TaskResult<T>) {
        self.send(result);
    }

    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    pub fn fail(self, error: TaskError) {
        self.complete(Err(error));
    }

    fn send(&mut self, result: TaskResult<T>) {
        let Some(sender) = self.sender.take() else {
            return;
        };
        // The handle may already be gone; nobody is left to tell.
        let _ = sender.send(result);
        drop(sender);

        let pending = {
            let mut listeners = lock(&self.listeners);
            listeners.fired = true;
            std::mem::take(&mut listeners.pending)
        };
        for listener in pending {
            listener();
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        self.send(Err(TaskError::Abandoned));
    }
}

impl<T> fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("completed", &self.sender.is_none())
            .finish()
    }
}

/// Asynchronously resolved container for a task's value or failure.
pub struct ResultHandle<T: 'static> {
    receiver: Receiver<TaskResult<T>>,
    listeners: Arc<Mutex<Listeners>>,
    // Holds a result pulled off the channel by `failure`.
    received: Mutex<Option<TaskResult<T>>>,
    mapper: Option<ErrorMapper>,
    pending: Option<Pin<Box<RecvFut<'static, TaskResult<T>>>>>,
    terminated: bool,
}

impl<T: 'static> ResultHandle<T> {
    /// Create a connected completer and handle.
    pub fn pair() -> (Completer<T>, ResultHandle<T>) {
        let (sender, receiver) = flume::bounded(1);
        let listeners = Arc::new(Mutex::new(Listeners::default()));
        let completer = Completer {
            sender: Some(sender),
            listeners: Arc::clone(&listeners),
        };
        let handle = ResultHandle {
            receiver,
            listeners,
            received: Mutex::new(None),
            mapper: None,
            pending: None,
            terminated: false,
        };
        (completer, handle)
    }

    /// A handle that is already resolved.
    pub fn ready(result: TaskResult<T>) -> Self {
        let (completer, handle) = Self::pair();
        completer.complete(result);
        handle
    }

    /// Whether the task has produced its value or failure.
    pub fn is_resolved(&self) -> bool {
        self.terminated
            || lock(&self.received).is_some()
            || !self.receiver.is_empty()
            || self.receiver.is_disconnected()
    }

    /// Peek at the failure, if the handle resolved with one.
    ///
    /// The failure is passed through any `map_err` chain before it is returned.
    pub fn failure(&self) -> Option<TaskError> {
        let mut received = lock(&self.received);
        if received.is_none() {
            *received = self.receiver.try_recv().ok();
        }
        let error = match &*received {
            Some(Err(error)) => error.clone(),
            _ => return None,
        };
        drop(received);
        Some(self.map_failure(error))
    }

    /// Block the calling thread until the handle resolves.
    pub fn wait(self) -> TaskResult<T> {
        let result = match self.take_received() {
            Some(result) => result,
            None => self.receiver.recv().unwrap_or(Err(TaskError::Abandoned)),
        };
        self.apply(result)
    }

    /// Block until the handle resolves or the timeout passes.
    ///
    /// On timeout the handle is returned unchanged so the caller can keep
    /// waiting later. A timeout too large to express as a deadline waits
    /// without one.
    pub fn wait_timeout(self, timeout: Duration) -> Result<TaskResult<T>, Self> {
        if let Some(result) = self.take_received() {
            return Ok(self.apply(result));
        }
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            return Ok(self.wait());
        };
        match self.receiver.recv_deadline(deadline) {
            Ok(result) => Ok(self.apply(result)),
            Err(RecvTimeoutError::Timeout) => Err(self),
            Err(RecvTimeoutError::Disconnected) => Ok(self.apply(Err(TaskError::Abandoned))),
        }
    }

    /// Chain a transformation applied to the failure case.
    pub fn map_err<F>(mut self, f: F) -> Self
    where
        F: Fn(TaskError) -> TaskError + Send + Sync + 'static,
    {
        let mapper: ErrorMapper = match self.mapper.take() {
            Some(previous) => Arc::new(move |error: TaskError| f(previous(error))),
            None => Arc::new(f),
        };
        self.mapper = Some(mapper);
        self
    }

    /// Wrap a failure with context describing what the task was doing.
    pub fn context<C>(self, context: C) -> Self
    where
        C: Into<String>,
    {
        let context = context.into();
        self.map_err(move |error| error.context(context.clone()))
    }

    fn take_received(&self) -> Option<TaskResult<T>> {
        lock(&self.received).take()
    }

    fn map_failure(&self, error: TaskError) -> TaskError {
        match &self.mapper {
            Some(mapper) => mapper(error),
            None => error,
        }
    }

    fn apply(&self, result: TaskResult<T>) -> TaskResult<T> {
        result.map_err(|error| self.map_failure(error))
    }
}

impl ResultHandle<()> {
    /// Fan-in: a handle that resolves once every given handle has resolved.
    ///
    /// The aggregate always resolves successfully; it carries no information
    /// about which constituents failed. Inspect the constituents for that.
    pub fn all<'a, T, I>(handles: I) -> ResultHandle<()>
    where
        T: 'a + 'static,
        I: IntoIterator<Item = &'a ResultHandle<T>>,
    {
        let handles: Vec<&ResultHandle<T>> = handles.into_iter().collect();
        let (completer, aggregate) = ResultHandle::pair();

        if handles.is_empty() {
            completer.succeed(());
            return aggregate;
        }

        let remaining = Arc::new(AtomicUsize::new(handles.len()));
        let completer = Arc::new(Mutex::new(Some(completer)));

        for handle in handles {
            let remaining = Arc::clone(&remaining);
            let completer = Arc::clone(&completer);
            on_resolved(
                &handle.listeners,
                Box::new(move || {
                    if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                        if let Some(completer) = lock(&completer).take() {
                            completer.succeed(());
                        }
                    }
                }),
            );
        }

        aggregate
    }
}

// The cached result is never pinned, so moving the handle is always sound.
impl<T: 'static> Unpin for ResultHandle<T> {}

impl<T: 'static> Future for ResultHandle<T> {
    type Output = TaskResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        let result = match this.take_received() {
            Some(result) => result,
            None => {
                let receiver = &this.receiver;
                let pending = this
                    .pending
                    .get_or_insert_with(|| Box::pin(receiver.clone().into_recv_async()));
                match pending.poll_unpin(cx) {
                    Poll::Ready(received) => received.unwrap_or(Err(TaskError::Abandoned)),
                    Poll::Pending => return Poll::Pending,
                }
            }
        };

        this.pending = None;
        this.terminated = true;
        Poll::Ready(this.apply(result))
    }
}

impl<T: 'static> FusedFuture for ResultHandle<T> {
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl<T: 'static> fmt::Debug for ResultHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandle")
            .field("resolved", &self.is_resolved())
            .field("mapped", &self.mapper.is_some())
            .finish()
    }
}
