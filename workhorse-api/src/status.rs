//! # Pool Status and Shutdown Reporting
//!
//! Read-only views of an executor. A [`PoolStatus`] is assembled from
//! individually atomic counters, so fields are each accurate but are not
//! guaranteed to be consistent with one another.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Lifecycle phase of an executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPhase {
    /// Accepting and running tasks
    Running = 0,

    /// No longer accepting tasks; queued and running tasks finish
    Draining = 1,

    /// Workers interrupted and queued tasks discarded
    Forced = 2,

    /// Shutdown sequence finished
    Terminated = 3,
}

impl ShutdownPhase {
    /// Decode a phase stored in an atomic.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ShutdownPhase::Running,
            1 => ShutdownPhase::Draining,
            2 => ShutdownPhase::Forced,
            _ => ShutdownPhase::Terminated,
        }
    }

    pub fn accepts_tasks(self) -> bool {
        self == ShutdownPhase::Running
    }
}

impl fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownPhase::Running => "running",
            ShutdownPhase::Draining => "draining",
            ShutdownPhase::Forced => "forced",
            ShutdownPhase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Snapshot of the pool counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    /// Tasks currently executing on worker threads
    pub active: usize,

    /// Tasks that have finished, successfully or not, including caller-run tasks
    pub completed: u64,

    /// Tasks admitted since the pool started, including caller-run tasks
    pub total_accepted: u64,

    /// Tasks waiting in the queue
    pub queue_depth: usize,

    /// Worker threads currently alive
    pub threads: usize,

    /// Highest number of worker threads alive at once
    pub largest_threads: usize,

    /// Tasks executed on the submitting thread because the pool was saturated
    pub caller_runs: u64,

    /// Tasks that returned an error or panicked
    pub failed: u64,

    pub core_threads: usize,
    pub max_threads: usize,
    pub queue_capacity: usize,

    /// Lifecycle phase at the time of the snapshot
    pub phase: ShutdownPhase,
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Active: {}, Completed: {}, Total: {}, Queue: {}/{}, Threads: {}/{} (core {}, peak {}), Caller-runs: {}, Failed: {}, Phase: {}",
            self.active,
            self.completed,
            self.total_accepted,
            self.queue_depth,
            self.queue_capacity,
            self.threads,
            self.max_threads,
            self.core_threads,
            self.largest_threads,
            self.caller_runs,
            self.failed,
            self.phase,
        )
    }
}

/// Outcome of the shutdown sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownReport {
    /// Deepest phase the sequence passed through before terminating
    pub deepest_phase: ShutdownPhase,

    /// All workers exited within the drain window
    pub graceful: bool,

    /// Queued tasks discarded by the forced phase
    pub discarded_jobs: usize,

    /// Worker threads still alive when the sequence gave up waiting
    pub remaining_threads: usize,

    /// Time spent in the shutdown sequence
    pub elapsed: Duration,
}

impl ShutdownReport {
    /// Every worker exited, by either path.
    pub fn is_complete(&self) -> bool {
        self.remaining_threads == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_round_trips_through_u8() {
        for phase in [
            ShutdownPhase::Running,
            ShutdownPhase::Draining,
            ShutdownPhase::Forced,
            ShutdownPhase::Terminated,
        ] {
            assert_eq!(ShutdownPhase::from_u8(phase as u8), phase);
        }
        assert!(ShutdownPhase::Running.accepts_tasks());
        assert!(!ShutdownPhase::Draining.accepts_tasks());
    }
}
