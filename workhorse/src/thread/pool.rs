use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError, RwLock};
use std::time::Duration;

use flume::{Receiver, Sender, TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;
use workhorse_api::{Admission, Job, JobOutcome, PoolStatus, ShutdownPhase, TaskError};

use super::factory::{NamedThreadFactory, ThreadFactory};
use super::worker;
use crate::config::PoolConfig;

/// State shared between the pool handle and its worker threads.
pub(crate) struct Shared {
    pub(crate) pool_id: String,
    pub(crate) receiver: Receiver<Job>,
    pub(crate) core_threads: usize,
    pub(crate) max_threads: usize,
    pub(crate) keep_alive: Duration,
    pub(crate) interrupted: Arc<AtomicBool>,

    pub(crate) threads: AtomicUsize,
    largest_threads: AtomicUsize,
    active: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,

    exit_lock: Mutex<()>,
    exited: Condvar,
}

impl Shared {
    /// Claim one thread unit if fewer than `limit` are in use.
    pub(crate) fn reserve_thread(&self, limit: usize) -> bool {
        match self
            .threads
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < limit).then(|| n + 1))
        {
            Ok(previous) => {
                self.largest_threads.fetch_max(previous + 1, Ordering::Relaxed);
                true
            }
            Err(_) => false,
        }
    }

    pub(crate) fn notify_exit(&self) {
        let _lock = self.exit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.exited.notify_all();
    }

    pub(crate) fn run_on_worker(&self, job: Job) {
        self.active.fetch_add(1, Ordering::AcqRel);
        let outcome = worker::run_job(job);
        self.active.fetch_sub(1, Ordering::AcqRel);
        self.record(outcome);
    }

    fn record(&self, outcome: JobOutcome) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if outcome == JobOutcome::Failed {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// A bounded pool of worker threads fed by a fixed-capacity queue.
///
/// Admission follows four steps, in order:
///
/// 1. fewer than `core_threads` threads: start a thread with the job
/// 2. the queue has room: enqueue the job
/// 3. fewer than `max_threads` threads: start an overflow thread with the job
/// 4. otherwise run the job on the submitting thread
///
/// Step 4 slows producers down to the pool's pace instead of dropping work.
pub struct WorkerPool {
    shared: Arc<Shared>,
    sender: RwLock<Option<Sender<Job>>>,
    factory: Arc<dyn ThreadFactory>,
    queue_capacity: usize,
    total_accepted: AtomicU64,
    caller_runs: AtomicU64,
}

impl WorkerPool {
    /// Build a pool whose threads are named from the configured prefix.
    pub fn new(config: &PoolConfig) -> Self {
        let factory = NamedThreadFactory::new(config.thread_name_prefix.clone())
            .with_stack_size(config.stack_size);
        Self::with_factory(config, Arc::new(factory))
    }

    /// Build a pool that takes its threads from `factory`.
    ///
    /// No threads are started until work arrives.
    pub fn with_factory(config: &PoolConfig, factory: Arc<dyn ThreadFactory>) -> Self {
        let (sender, receiver) = flume::bounded(config.queue_capacity);
        let shared = Arc::new(Shared {
            pool_id: Uuid::new_v4().to_string(),
            receiver,
            core_threads: config.core_threads,
            max_threads: config.max_threads,
            keep_alive: config.keep_alive,
            interrupted: Arc::new(AtomicBool::new(false)),
            threads: AtomicUsize::new(0),
            largest_threads: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            exit_lock: Mutex::new(()),
            exited: Condvar::new(),
        });

        debug!(
            pool_id = %shared.pool_id,
            core_threads = config.core_threads,
            max_threads = config.max_threads,
            queue_capacity = config.queue_capacity,
            factory = ?factory,
            "Worker pool created"
        );

        Self {
            shared,
            sender: RwLock::new(Some(sender)),
            factory,
            queue_capacity: config.queue_capacity,
            total_accepted: AtomicU64::new(0),
            caller_runs: AtomicU64::new(0),
        }
    }

    /// Identifier attached to every log line the pool emits.
    pub fn id(&self) -> &str {
        &self.shared.pool_id
    }

    /// Admit a job according to the four-step policy.
    pub fn execute(&self, job: Job) -> Admission {
        let sender = self.sender.read().unwrap_or_else(PoisonError::into_inner);
        let Some(queue) = sender.as_ref() else {
            drop(sender);
            warn!(pool_id = %self.shared.pool_id, "Job rejected: pool is closed");
            job.reject(TaskError::Rejected);
            return Admission::Rejected;
        };
        self.total_accepted.fetch_add(1, Ordering::Relaxed);

        let mut job = job;

        if self.shared.reserve_thread(self.shared.core_threads) {
            match self.start_worker(job) {
                Ok(()) => return Admission::Started,
                Err(returned) => job = returned,
            }
        }

        match queue.try_send(job) {
            Ok(()) => {
                // Zero core threads: nothing is guaranteed to be listening yet.
                if self.shared.threads.load(Ordering::Acquire) == 0
                    && self.shared.reserve_thread(self.shared.max_threads)
                {
                    self.start_idle_worker();
                }
                return Admission::Queued;
            }
            Err(TrySendError::Full(returned)) | Err(TrySendError::Disconnected(returned)) => {
                job = returned;
            }
        }

        if self.shared.reserve_thread(self.shared.max_threads) {
            match self.start_worker(job) {
                Ok(()) => return Admission::StartedOverflow,
                Err(returned) => job = returned,
            }
        }

        drop(sender);
        self.run_on_caller(job);
        Admission::CallerRan
    }

    /// Spawn a worker carrying `job` on an already reserved thread unit.
    ///
    /// Hands the job back when the thread cannot be started.
    fn start_worker(&self, job: Job) -> Result<(), Job> {
        worker::spawn(&self.shared, self.factory.as_ref(), Some(job)).or_else(|(err, returned)| {
            warn!(pool_id = %self.shared.pool_id, error = %err, "Failed to spawn worker thread");
            // The job only leaves its slot once the new thread is running.
            match returned {
                Some(job) => Err(job),
                None => Ok(()),
            }
        })
    }

    fn start_idle_worker(&self) {
        if let Err((err, _)) = worker::spawn(&self.shared, self.factory.as_ref(), None) {
            warn!(pool_id = %self.shared.pool_id, error = %err, "Failed to spawn worker thread");
        }
    }

    fn run_on_caller(&self, job: Job) {
        let runs = self.caller_runs.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            pool_id = %self.shared.pool_id,
            caller_runs = runs,
            "Pool saturated, running job on the submitting thread"
        );
        let outcome = worker::run_job(job);
        self.shared.record(outcome);
    }

    /// Stop accepting work. Queued jobs are still run.
    pub fn close(&self) {
        let mut sender = self.sender.write().unwrap_or_else(PoisonError::into_inner);
        if sender.take().is_some() {
            debug!(pool_id = %self.shared.pool_id, "Worker pool closed to new work");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Signal workers to stop and discard every job still queued.
    ///
    /// Discarded jobs are rejected with [`TaskError::Abandoned`]. Returns how
    /// many were discarded.
    pub fn interrupt(&self) -> usize {
        self.shared.interrupted.store(true, Ordering::Release);
        let mut discarded = 0;
        for job in self.shared.receiver.try_iter() {
            job.reject(TaskError::Abandoned);
            discarded += 1;
        }
        debug!(pool_id = %self.shared.pool_id, discarded, "Worker pool interrupted");
        discarded
    }

    /// Block until every worker thread has exited or `timeout` elapses.
    ///
    /// Returns `true` when no worker threads remain.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        let lock = self.shared.exit_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (_lock, _) = self
            .shared
            .exited
            .wait_timeout_while(lock, timeout, |_| self.shared.threads.load(Ordering::Acquire) > 0)
            .unwrap_or_else(PoisonError::into_inner);
        self.thread_count() == 0
    }

    pub fn thread_count(&self) -> usize {
        self.shared.threads.load(Ordering::Acquire)
    }

    pub fn queue_depth(&self) -> usize {
        self.shared.receiver.len()
    }

    /// Read the counters, tagged with the executor's current phase.
    pub fn snapshot(&self, phase: ShutdownPhase) -> PoolStatus {
        let shared = &self.shared;
        PoolStatus {
            active: shared.active.load(Ordering::Relaxed),
            completed: shared.completed.load(Ordering::Relaxed),
            total_accepted: self.total_accepted.load(Ordering::Relaxed),
            queue_depth: shared.receiver.len(),
            threads: shared.threads.load(Ordering::Relaxed),
            largest_threads: shared.largest_threads.load(Ordering::Relaxed),
            caller_runs: self.caller_runs.load(Ordering::Relaxed),
            failed: shared.failed.load(Ordering::Relaxed),
            core_threads: shared.core_threads,
            max_threads: shared.max_threads,
            queue_capacity: self.queue_capacity,
            phase,
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.shared.pool_id)
            .field("threads", &self.thread_count())
            .field("queue_depth", &self.queue_depth())
            .field("closed", &self.is_closed())
            .finish()
    }
}
