//! Cooperative interruption for pool workers.
//!
//! A forced shutdown cannot stop a running closure. It raises a flag that
//! every worker thread shares with the pool; long-running tasks poll
//! [`is_interrupted`] and return early when it is set.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

thread_local! {
    static INTERRUPT: RefCell<Option<Arc<AtomicBool>>> = const { RefCell::new(None) };
}

/// Whether the pool running the current thread has been force-stopped.
///
/// Always `false` off pool threads, including for tasks run on the
/// submitting thread under backpressure.
pub fn is_interrupted() -> bool {
    INTERRUPT.with(|slot| {
        slot.borrow()
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Acquire))
    })
}

pub(crate) fn install(flag: Arc<AtomicBool>) {
    INTERRUPT.with(|slot| *slot.borrow_mut() = Some(flag));
}
