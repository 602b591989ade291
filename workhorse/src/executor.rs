use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tracing::error;
use workhorse_api::{
    Admission, Executor, ExecutorError, Job, PoolStatus, ShutdownPhase, ShutdownReport,
};

use crate::config::ExecutorConfig;
use crate::shutdown::{ShutdownCoordinator, ShutdownLatch};
use crate::signal::{CtrlC, TerminationSignal};
use crate::thread::{NamedThreadFactory, ThreadFactory, WorkerPool};

pub const SIGNAL_THREAD_NAME: &str = "workhorse-signal";

/// The worker pool together with its shutdown coordinator.
///
/// Tasks are submitted through [`workhorse_api::ExecutorExt`], which every
/// `TaskExecutor` implements. Dropping the executor without shutting it down
/// closes the queue; workers finish what is queued and exit.
pub struct TaskExecutor {
    pool: Arc<WorkerPool>,
    coordinator: Arc<ShutdownCoordinator>,
    latch: Arc<ShutdownLatch>,
    signal_registered: AtomicBool,
    signal_failure: Arc<Mutex<Option<String>>>,
}

type Watcher = Box<dyn FnOnce() + Send + 'static>;

impl TaskExecutor {
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        let factory = NamedThreadFactory::new(config.pool.thread_name_prefix.clone())
            .with_stack_size(config.pool.stack_size);
        Self::with_factory(config, Arc::new(factory))
    }

    /// Build an executor whose workers come from `factory`.
    pub fn with_factory(
        config: ExecutorConfig,
        factory: Arc<dyn ThreadFactory>,
    ) -> Result<Self, ExecutorError> {
        config
            .validate()
            .map_err(|err| ExecutorError::Config(err.to_string()))?;

        let pool = Arc::new(WorkerPool::with_factory(&config.pool, factory));
        let coordinator = Arc::new(ShutdownCoordinator::new(pool.clone(), config.shutdown.clone()));

        crate::log_pool!(
            pool.id(),
            "started",
            core_threads = config.pool.core_threads,
            max_threads = config.pool.max_threads,
            queue_capacity = config.pool.queue_capacity,
            keep_alive = ?config.pool.keep_alive
        );

        Ok(Self {
            pool,
            coordinator,
            latch: Arc::new(ShutdownLatch::new()),
            signal_registered: AtomicBool::new(false),
            signal_failure: Arc::new(Mutex::new(None)),
        })
    }

    pub fn id(&self) -> &str {
        self.pool.id()
    }

    pub fn phase(&self) -> ShutdownPhase {
        self.coordinator.phase()
    }

    /// Block until Ctrl+C or SIGTERM has triggered shutdown and shutdown has finished.
    pub fn wait_indefinitely(&self) -> Result<ShutdownReport, ExecutorError> {
        self.wait_for_signal(CtrlC)
    }

    /// Block until `signal` has triggered shutdown and shutdown has finished.
    ///
    /// The signal is watched on a dedicated thread. A shutdown started any
    /// other way also releases the wait. Only the first call installs a
    /// watcher; later calls just wait.
    ///
    /// If the signal source fails, shutdown still runs and the failure is
    /// returned as [`ExecutorError::Signal`].
    pub fn wait_for_signal<S: TerminationSignal>(
        &self,
        signal: S,
    ) -> Result<ShutdownReport, ExecutorError> {
        self.watch(signal, |watcher| {
            thread::Builder::new()
                .name(SIGNAL_THREAD_NAME.to_string())
                .spawn(watcher)
                .map(drop)
        })
    }

    fn watch<S, F>(&self, signal: S, spawn: F) -> Result<ShutdownReport, ExecutorError>
    where
        S: TerminationSignal,
        F: FnOnce(Watcher) -> io::Result<()>,
    {
        if !self.signal_registered.swap(true, Ordering::AcqRel) {
            let coordinator = self.coordinator.clone();
            let latch = self.latch.clone();
            let failure = self.signal_failure.clone();
            let signal: Box<dyn TerminationSignal> = Box::new(signal);

            let watcher: Watcher = Box::new(move || {
                if let Err(err) = signal.wait() {
                    error!(error = %err, "Termination signal failed, shutting down");
                    *failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
                }
                coordinator.shutdown();
                latch.release();
            });

            if let Err(err) = spawn(watcher) {
                // Nothing is watching, so a later call may try again.
                self.signal_registered.store(false, Ordering::Release);
                return Err(ExecutorError::ThreadSpawn(err));
            }
        }

        self.latch.wait();
        let report = self.coordinator.shutdown();
        match self
            .signal_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            Some(message) => Err(ExecutorError::Signal(message)),
            None => Ok(report),
        }
    }
}

impl Executor for TaskExecutor {
    fn execute_job(&self, job: Job) -> Admission {
        self.pool.execute(job)
    }

    fn status(&self) -> PoolStatus {
        self.pool.snapshot(self.coordinator.phase())
    }

    fn shutdown(&self) -> ShutdownReport {
        let report = self.coordinator.shutdown();
        self.latch.release();
        report
    }

    fn is_shutdown(&self) -> bool {
        self.coordinator.is_shutdown()
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("pool", &self.pool)
            .field("phase", &self.phase())
            .finish()
    }
}
