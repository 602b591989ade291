#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    use workhorse::logging;
    use workhorse::signal;
    use workhorse::{
        is_interrupted, job, Admission, Executor, ExecutorConfig, ExecutorError, ExecutorExt,
        PoolConfig, ShutdownConfig, ShutdownPhase, TaskError, TaskExecutor,
    };

    fn executor(core: usize, max: usize, queue: usize, shutdown: ShutdownConfig) -> TaskExecutor {
        logging::init_test();
        let config = ExecutorConfig::default()
            .with_pool(
                PoolConfig::default()
                    .with_threads(core, max)
                    .with_queue_capacity(queue),
            )
            .with_shutdown(shutdown);
        TaskExecutor::new(config).unwrap()
    }

    fn timeouts(drain_ms: u64, force_ms: u64) -> ShutdownConfig {
        ShutdownConfig::default()
            .with_drain_timeout(Duration::from_millis(drain_ms))
            .with_force_timeout(Duration::from_millis(force_ms))
    }

    #[test]
    fn test_graceful_shutdown_drains_queue() {
        let executor = executor(2, 2, 10, ShutdownConfig::default());

        let handles: Vec<_> = (0..6_u64)
            .map(|n| {
                executor.submit(move || {
                    thread::sleep(Duration::from_millis(20));
                    Ok(n)
                })
            })
            .collect();

        let report = executor.shutdown();
        assert!(report.graceful);
        assert_eq!(report.deepest_phase, ShutdownPhase::Draining);
        assert_eq!(report.discarded_jobs, 0);
        assert!(report.is_complete());

        let results: Vec<u64> = handles.into_iter().map(|h| h.wait().unwrap()).collect();
        assert_eq!(results, vec![0, 1, 2, 3, 4, 5]);

        let status = executor.status();
        assert_eq!(status.phase, ShutdownPhase::Terminated);
        assert_eq!(status.threads, 0);
        assert_eq!(status.completed, 6);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let executor = executor(1, 1, 4, ShutdownConfig::default());
        executor.submit(|| Ok(())).wait().unwrap();

        let first = executor.shutdown();
        let second = executor.shutdown();
        assert_eq!(first, second);
        assert!(executor.is_shutdown());
    }

    #[test]
    fn test_concurrent_shutdown_callers_share_one_report() {
        let executor = Arc::new(executor(2, 2, 4, ShutdownConfig::default()));
        executor.execute(|| thread::sleep(Duration::from_millis(50)));

        let callers: Vec<_> = (0..4)
            .map(|_| {
                let executor = executor.clone();
                thread::spawn(move || executor.shutdown())
            })
            .collect();

        let reports: Vec<_> = callers.into_iter().map(|c| c.join().unwrap()).collect();
        assert!(reports.windows(2).all(|pair| pair[0] == pair[1]));
        assert!(reports[0].graceful);
    }

    #[test]
    fn test_submissions_after_shutdown_are_rejected() {
        let executor = executor(1, 1, 4, ShutdownConfig::default());
        executor.shutdown();

        let handle = executor.submit(|| Ok("too late"));
        assert!(matches!(handle.wait(), Err(TaskError::Rejected)));
        assert_eq!(executor.execute_job(job(|| {})), Admission::Rejected);
        assert_eq!(executor.status().total_accepted, 0);
    }

    #[test]
    fn test_forced_shutdown_interrupts_and_discards() {
        let executor = executor(1, 1, 5, timeouts(100, 2_000));

        let cooperative = executor.submit(|| {
            while !is_interrupted() {
                thread::sleep(Duration::from_millis(5));
            }
            Ok("stopped early")
        });
        let queued: Vec<_> = (0..2).map(|n| executor.submit(move || Ok(n))).collect();

        let report = executor.shutdown();
        assert!(!report.graceful);
        assert_eq!(report.deepest_phase, ShutdownPhase::Forced);
        assert_eq!(report.discarded_jobs, 2);
        assert!(report.is_complete());

        assert_eq!(cooperative.wait().unwrap(), "stopped early");
        for handle in queued {
            assert!(matches!(handle.wait(), Err(TaskError::Abandoned)));
        }
        assert_eq!(executor.phase(), ShutdownPhase::Terminated);
    }

    #[test]
    fn test_stubborn_task_leaves_threads_behind() {
        let executor = executor(1, 1, 5, timeouts(50, 50));
        let (release_tx, release_rx) = flume::bounded::<()>(0);

        let stubborn = executor.execute(move || {
            let _ = release_rx.recv();
        });

        let started = Instant::now();
        let report = executor.shutdown();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(report.deepest_phase, ShutdownPhase::Forced);
        assert_eq!(report.remaining_threads, 1);
        assert!(!report.is_complete());
        assert_eq!(executor.phase(), ShutdownPhase::Terminated);

        drop(release_tx);
        assert!(stubborn.wait().is_ok());
    }

    #[test]
    fn test_wait_for_signal_shuts_down_and_returns_report() {
        let executor = Arc::new(executor(2, 2, 4, ShutdownConfig::default()));
        let (trigger, signal) = signal::manual();

        let waiter = {
            let executor = executor.clone();
            thread::spawn(move || executor.wait_for_signal(signal))
        };

        let handle = executor.submit(|| Ok(7));
        assert_eq!(handle.wait().unwrap(), 7);
        assert!(!waiter.is_finished());

        trigger.fire();
        let report = waiter.join().unwrap().unwrap();
        assert!(report.graceful);
        assert_eq!(executor.phase(), ShutdownPhase::Terminated);
    }

    #[test]
    fn test_direct_shutdown_releases_waiter() {
        let executor = Arc::new(executor(1, 1, 4, ShutdownConfig::default()));
        let (_trigger, signal) = signal::manual();

        let waiter = {
            let executor = executor.clone();
            thread::spawn(move || executor.wait_for_signal(signal))
        };

        thread::sleep(Duration::from_millis(20));
        let report = executor.shutdown();
        assert_eq!(waiter.join().unwrap().unwrap(), report);
    }

    #[test]
    fn test_dropped_signal_source_is_reported_after_shutdown() {
        let executor = executor(1, 1, 4, ShutdownConfig::default());
        let (trigger, signal) = signal::manual();
        drop(trigger);

        match executor.wait_for_signal(signal) {
            Err(ExecutorError::Signal(message)) => {
                assert_eq!(message, "Signal source dropped without firing")
            }
            other => panic!("expected a signal error, got {other:?}"),
        }
        assert!(executor.is_shutdown());
        assert_eq!(executor.phase(), ShutdownPhase::Terminated);
        assert!(executor.shutdown().graceful);
    }
}
