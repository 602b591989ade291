//! Two-phase shutdown and the process-exit latch.
//!
//! Shutdown first drains: the pool stops admitting work and queued and
//! running tasks get `drain_timeout` to finish. If threads remain, it forces:
//! workers are interrupted, queued jobs are discarded, and the remaining
//! threads get `force_timeout` to exit. Whatever the outcome, the executor
//! ends in [`ShutdownPhase::Terminated`].

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use tracing::{info, warn};
use workhorse_api::{ShutdownPhase, ShutdownReport};

use crate::config::ShutdownConfig;
use crate::thread::WorkerPool;

/// Drives a pool through Running, Draining, Forced and Terminated.
pub struct ShutdownCoordinator {
    pool: Arc<WorkerPool>,
    config: ShutdownConfig,
    phase: AtomicU8,
    report: OnceLock<ShutdownReport>,
    sequence: Mutex<()>,
}

impl ShutdownCoordinator {
    pub fn new(pool: Arc<WorkerPool>, config: ShutdownConfig) -> Self {
        Self {
            pool,
            config,
            phase: AtomicU8::new(ShutdownPhase::Running as u8),
            report: OnceLock::new(),
            sequence: Mutex::new(()),
        }
    }

    pub fn phase(&self) -> ShutdownPhase {
        ShutdownPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Whether shutdown has begun.
    pub fn is_shutdown(&self) -> bool {
        !self.phase().accepts_tasks()
    }

    /// Run the shutdown sequence once.
    ///
    /// Every call blocks until the sequence has finished and returns the same
    /// report; only the first caller does the work.
    pub fn shutdown(&self) -> ShutdownReport {
        if let Some(report) = self.report.get() {
            return report.clone();
        }

        let _sequence = self.sequence.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(report) = self.report.get() {
            return report.clone();
        }

        let report = self.run_sequence();
        self.report.get_or_init(|| report).clone()
    }

    fn run_sequence(&self) -> ShutdownReport {
        let started = Instant::now();
        let pool_id = self.pool.id();

        self.set_phase(ShutdownPhase::Draining);
        info!(
            pool_id,
            drain_timeout = ?self.config.drain_timeout,
            queued = self.pool.queue_depth(),
            "Shutdown started, draining"
        );
        self.pool.close();

        let mut deepest_phase = ShutdownPhase::Draining;
        let mut discarded_jobs = 0;
        let graceful = self.pool.await_termination(self.config.drain_timeout);

        if !graceful {
            warn!(
                pool_id,
                threads = self.pool.thread_count(),
                queued = self.pool.queue_depth(),
                "Drain timed out, forcing shutdown"
            );
            self.set_phase(ShutdownPhase::Forced);
            deepest_phase = ShutdownPhase::Forced;
            discarded_jobs = self.pool.interrupt();

            if !self.pool.await_termination(self.config.force_timeout) {
                warn!(
                    pool_id,
                    threads = self.pool.thread_count(),
                    "Worker threads still running after forced shutdown"
                );
            }
        }

        self.set_phase(ShutdownPhase::Terminated);
        let report = ShutdownReport {
            deepest_phase,
            graceful,
            discarded_jobs,
            remaining_threads: self.pool.thread_count(),
            elapsed: started.elapsed(),
        };
        info!(
            pool_id,
            graceful = report.graceful,
            discarded_jobs = report.discarded_jobs,
            remaining_threads = report.remaining_threads,
            elapsed = ?report.elapsed,
            "Shutdown finished"
        );
        report
    }

    fn set_phase(&self, phase: ShutdownPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}

/// One-shot gate that holds the main thread until shutdown has finished.
///
/// Releasing is permanent and may happen any number of times.
pub struct ShutdownLatch {
    sender: Mutex<Option<Sender<()>>>,
    receiver: Receiver<()>,
}

impl ShutdownLatch {
    pub fn new() -> Self {
        let (sender, receiver) = flume::bounded(0);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    pub fn release(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_released(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Block until released.
    pub fn wait(&self) {
        // Nothing is ever sent; the channel only disconnects.
        let _ = self.receiver.recv();
    }

    /// Block until released or `timeout` elapses. Returns whether it was released.
    ///
    /// A timeout too large to express as a deadline waits for the release.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => !matches!(
                self.receiver.recv_deadline(deadline),
                Err(RecvTimeoutError::Timeout)
            ),
            None => {
                self.wait();
                true
            }
        }
    }
}

impl Default for ShutdownLatch {
    fn default() -> Self {
        Self::new()
    }
}
