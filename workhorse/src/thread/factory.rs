use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Source of configured thread builders for pool workers.
///
/// The pool asks the factory for one builder per worker it starts and spawns
/// the worker loop on it. Implementations decide naming and stack size.
pub trait ThreadFactory: Send + Sync + fmt::Debug {
    fn new_thread(&self) -> thread::Builder;
}

/// Names threads `<prefix><n>`, counting from 1 for the lifetime of the factory.
///
/// Standard threads carry no daemon flag and the process ends when `main`
/// returns, so workers are waited for by `shutdown` rather than at exit.
/// There is no priority control either; every worker runs at the platform
/// default.
pub struct NamedThreadFactory {
    prefix: String,
    counter: AtomicUsize,
    stack_size: Option<usize>,
}

impl NamedThreadFactory {
    pub fn new<S: Into<String>>(prefix: S) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicUsize::new(1),
            stack_size: None,
        }
    }

    pub fn with_stack_size(mut self, stack_size: Option<usize>) -> Self {
        self.stack_size = stack_size;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Claim the next thread name.
    pub fn next_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{}", self.prefix, n)
    }
}

impl ThreadFactory for NamedThreadFactory {
    fn new_thread(&self) -> thread::Builder {
        let builder = thread::Builder::new().name(self.next_name());
        match self.stack_size {
            Some(size) => builder.stack_size(size),
            None => builder,
        }
    }
}

impl fmt::Debug for NamedThreadFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedThreadFactory")
            .field("prefix", &self.prefix)
            .field("next", &self.counter.load(Ordering::Relaxed))
            .field("stack_size", &self.stack_size)
            .finish()
    }
}
