use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use flume::{RecvError, RecvTimeoutError};
use tracing::{debug, error, trace};
use workhorse_api::{Job, JobOutcome, TaskError};

use super::factory::ThreadFactory;
use super::interrupt;
use super::pool::Shared;

/// Owns one unit of the pool's thread count for the life of a worker.
///
/// Dropping the guard gives the unit back and wakes anyone waiting for the
/// pool to terminate, including when the worker unwinds.
struct ThreadGuard {
    shared: Arc<Shared>,
    held: bool,
}

impl ThreadGuard {
    /// Give the unit back early if the pool is above its core size.
    fn retire_if_above_core(&mut self) -> bool {
        let core = self.shared.core_threads;
        let retired = self
            .shared
            .threads
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n > core).then(|| n - 1))
            .is_ok();
        if retired {
            self.held = false;
            self.shared.notify_exit();
        }
        retired
    }

    /// Take a unit again after retiring, if the pool still has room.
    fn rejoin(&mut self) -> bool {
        if self.shared.reserve_thread(self.shared.max_threads) {
            self.held = true;
        }
        self.held
    }
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        if self.held {
            self.shared.threads.fetch_sub(1, Ordering::AcqRel);
            self.shared.notify_exit();
        }
    }
}

/// Start a worker on a thread unit the caller already reserved.
///
/// On failure the reserved unit is released and the first job, if any, is
/// handed back so the caller can place it elsewhere.
pub(crate) fn spawn(
    shared: &Arc<Shared>,
    factory: &dyn ThreadFactory,
    first: Option<Job>,
) -> Result<(), (io::Error, Option<Job>)> {
    let slot = Arc::new(Mutex::new(first));
    let worker_slot = slot.clone();
    let worker_shared = shared.clone();

    let spawned = factory.new_thread().spawn(move || {
        let first = worker_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(worker_slot);
        run(worker_shared, first);
    });

    match spawned {
        Ok(_) => Ok(()),
        Err(err) => {
            shared.threads.fetch_sub(1, Ordering::AcqRel);
            shared.notify_exit();
            let first = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
            Err((err, first))
        }
    }
}

fn run(shared: Arc<Shared>, first: Option<Job>) {
    interrupt::install(shared.interrupted.clone());
    let mut guard = ThreadGuard {
        shared: shared.clone(),
        held: true,
    };

    let name = std::thread::current().name().unwrap_or("<unnamed>").to_string();
    debug!(pool_id = %shared.pool_id, worker = %name, "Worker started");

    if let Some(job) = first {
        shared.run_on_worker(job);
    }

    loop {
        if shared.interrupted.load(Ordering::Acquire) {
            debug!(pool_id = %shared.pool_id, worker = %name, "Worker interrupted");
            break;
        }

        match next_job(&shared) {
            Ok(job) => shared.run_on_worker(job),
            Err(RecvTimeoutError::Timeout) => {
                if guard.retire_if_above_core() {
                    // A job queued while retiring would otherwise wait with no thread to take it.
                    if shared.receiver.is_empty() || !guard.rejoin() {
                        debug!(pool_id = %shared.pool_id, worker = %name, "Idle worker retired");
                        break;
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                trace!(pool_id = %shared.pool_id, worker = %name, "Queue closed and drained");
                break;
            }
        }
    }

    drop(guard);
    debug!(pool_id = %shared.pool_id, worker = %name, "Worker exited");
}

/// Wait up to the keep-alive for the next queued job.
///
/// A keep-alive too large to express as a deadline waits without one.
fn next_job(shared: &Shared) -> Result<Job, RecvTimeoutError> {
    match Instant::now().checked_add(shared.keep_alive) {
        Some(deadline) => shared.receiver.recv_deadline(deadline),
        None => shared
            .receiver
            .recv()
            .map_err(|RecvError::Disconnected| RecvTimeoutError::Disconnected),
    }
}

/// Run a job, capturing any panic that escapes it.
pub(crate) fn run_job(job: Job) -> JobOutcome {
    match panic::catch_unwind(AssertUnwindSafe(|| job.run())) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let failure = TaskError::from_panic(payload);
            error!(error = %failure, "Job panicked");
            JobOutcome::Failed
        }
    }
}
