#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use std::time::{Duration, Instant};

    use workhorse::logging;
    use workhorse::{
        job, Admission, Executor, ExecutorConfig, ExecutorExt, NamedThreadFactory, PoolConfig,
        ShutdownPhase, TaskError, TaskExecutor, ThreadFactory,
    };

    fn executor(core: usize, max: usize, queue: usize) -> TaskExecutor {
        logging::init_test();
        let pool = PoolConfig::default()
            .with_threads(core, max)
            .with_queue_capacity(queue)
            .with_thread_name_prefix("Pool-");
        TaskExecutor::new(ExecutorConfig::default().with_pool(pool)).unwrap()
    }

    // Poll until `check` holds or a few seconds pass.
    fn eventually<F: Fn() -> bool>(check: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        check()
    }

    #[test]
    fn test_first_submissions_start_core_threads() {
        let executor = executor(3, 6, 10);
        let barrier = Arc::new(Barrier::new(4));

        for _ in 0..3 {
            let barrier = barrier.clone();
            let admission = executor.execute_job(job(move || {
                barrier.wait();
            }));
            assert_eq!(admission, Admission::Started);
        }

        assert!(eventually(|| executor.status().active == 3));
        let status = executor.status();
        assert_eq!(status.threads, 3);
        assert_eq!(status.queue_depth, 0);
        assert_eq!(status.total_accepted, 3);

        barrier.wait();
        assert!(eventually(|| executor.status().completed == 3));
        executor.shutdown();
    }

    #[test]
    fn test_work_is_queued_once_core_threads_are_busy() {
        let executor = executor(1, 4, 10);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel();

        let first = executor.execute_job(job(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        }));
        started_rx.recv().unwrap();

        let second = executor.execute_job(job(|| {}));
        let third = executor.execute_job(job(|| {}));

        assert_eq!(first, Admission::Started);
        assert_eq!(second, Admission::Queued);
        assert_eq!(third, Admission::Queued);
        assert_eq!(executor.status().queue_depth, 2);
        assert_eq!(executor.status().threads, 1);

        drop(release_tx);
        assert!(eventually(|| executor.status().completed == 3));
        executor.shutdown();
    }

    #[test]
    fn test_full_queue_starts_overflow_thread() {
        let executor = executor(1, 2, 1);
        let (release_tx, release_rx) = flume::bounded::<()>(0);

        let gated = |release: flume::Receiver<()>| {
            job(move || {
                let _ = release.recv();
            })
        };

        assert_eq!(executor.execute_job(gated(release_rx.clone())), Admission::Started);
        assert_eq!(executor.execute_job(gated(release_rx.clone())), Admission::Queued);
        assert_eq!(
            executor.execute_job(gated(release_rx.clone())),
            Admission::StartedOverflow
        );

        let status = executor.status();
        assert_eq!(status.threads, 2);
        assert_eq!(status.largest_threads, 2);

        drop(release_tx);
        assert!(eventually(|| executor.status().completed == 3));
        executor.shutdown();
    }

    #[test]
    fn test_saturated_pool_runs_task_on_caller() {
        let executor = executor(1, 1, 1);
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel();

        let blocked = executor.execute_job(job(move || {
            started_tx.send(()).unwrap();
            let _ = release_rx.recv();
        }));
        started_rx.recv().unwrap();
        let queued = executor.execute_job(job(|| {}));

        let caller = thread::current().id();
        let handle = executor.submit(|| Ok(thread::current().id()));

        assert_eq!(blocked, Admission::Started);
        assert_eq!(queued, Admission::Queued);
        // Ran inline, so the handle is already resolved.
        assert!(handle.is_resolved());
        assert_eq!(handle.wait().unwrap(), caller);

        let status = executor.status();
        assert_eq!(status.caller_runs, 1);
        assert_eq!(status.threads, 1);

        drop(release_tx);
        assert!(eventually(|| executor.status().completed == 3));
        executor.shutdown();
    }

    #[test]
    fn test_seven_tasks_on_two_core_four_max_two_queue() {
        let executor = executor(2, 4, 2);
        let (release_tx, release_rx) = flume::bounded::<()>(0);
        let caller = thread::current().id();

        let handles: Vec<_> = (0..7)
            .map(|_| {
                let release = release_rx.clone();
                executor.submit(move || {
                    if thread::current().id() != caller {
                        let _ = release.recv();
                    }
                    Ok(thread::current().name().map(str::to_string))
                })
            })
            .collect();

        let status = executor.status();
        assert_eq!(status.threads, 4);
        assert_eq!(status.queue_depth, 2);
        assert_eq!(status.caller_runs, 1);
        assert_eq!(status.total_accepted, 7);
        assert!(handles[6].is_resolved());

        drop(release_tx);
        let names: Vec<_> = handles.into_iter().map(|h| h.wait().unwrap()).collect();

        let caller_name = thread::current().name().map(str::to_string);
        assert_eq!(names[6], caller_name);
        for name in &names[..6] {
            assert!(name.as_deref().is_some_and(|n| n.starts_with("Pool-")));
        }
        assert!(executor.status().largest_threads <= 4);
        executor.shutdown();
    }

    #[test]
    fn test_zero_core_threads_still_runs_queued_work() {
        let executor = executor(0, 2, 4);

        let handle = executor.submit(|| Ok("ran"));
        assert_eq!(handle.wait().unwrap(), "ran");
        assert_eq!(executor.status().largest_threads, 1);
        executor.shutdown();
    }

    #[test]
    fn test_seven_instant_tasks_queue_without_caller_runs() {
        let executor = executor(2, 4, 2);
        let completed = Arc::new(AtomicUsize::new(0));

        let mut admissions = Vec::new();
        for _ in 0..7 {
            // Instant tasks keep the queue from staying full.
            assert!(eventually(|| executor.status().queue_depth < 2));
            let completed = completed.clone();
            admissions.push(executor.execute_job(job(move || {
                completed.fetch_add(1, Ordering::SeqCst);
            })));
        }

        assert_eq!(admissions[..2], [Admission::Started, Admission::Started]);
        assert_eq!(admissions[2], Admission::Queued);
        assert!(!admissions.contains(&Admission::CallerRan));
        assert!(!admissions.contains(&Admission::Rejected));

        assert!(eventually(|| completed.load(Ordering::SeqCst) == 7));
        let status = executor.status();
        assert_eq!(status.caller_runs, 0);
        assert_eq!(status.total_accepted, 7);
        assert!(status.largest_threads <= 4);
        assert!(eventually(|| executor.status().completed == 7));
        executor.shutdown();
    }

    #[test]
    fn test_unbounded_keep_alive_keeps_worker_serving() {
        logging::init_test();
        let pool = PoolConfig::default()
            .with_threads(1, 1)
            .with_queue_capacity(8)
            .with_keep_alive(Duration::from_secs(u64::MAX));
        let executor = TaskExecutor::new(ExecutorConfig::default().with_pool(pool)).unwrap();

        let handles: Vec<_> = (0..5).map(|n| executor.submit(move || Ok(n * 10))).collect();
        let results: Vec<i32> = handles.into_iter().map(|h| h.wait().unwrap()).collect();

        assert_eq!(results, vec![0, 10, 20, 30, 40]);
        let status = executor.status();
        assert_eq!(status.threads, 1);
        assert_eq!(status.failed, 0);

        let report = executor.shutdown();
        assert!(report.graceful);
        assert!(report.is_complete());
    }

    #[test]
    fn test_threads_are_named_from_one() {
        let executor = executor(3, 3, 10);
        let barrier = Arc::new(Barrier::new(3));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let barrier = barrier.clone();
                executor.submit(move || {
                    barrier.wait();
                    Ok(thread::current().name().unwrap_or_default().to_string())
                })
            })
            .collect();

        let mut names: Vec<String> = handles.into_iter().map(|h| h.wait().unwrap()).collect();
        names.sort();
        assert_eq!(names, vec!["Pool-1", "Pool-2", "Pool-3"]);
        executor.shutdown();
    }

    #[derive(Debug)]
    struct CountingFactory {
        inner: NamedThreadFactory,
        built: AtomicUsize,
    }

    impl ThreadFactory for CountingFactory {
        fn new_thread(&self) -> thread::Builder {
            self.built.fetch_add(1, Ordering::SeqCst);
            self.inner.new_thread()
        }
    }

    #[test]
    fn test_custom_factory_supplies_every_worker() {
        logging::init_test();
        let factory = Arc::new(CountingFactory {
            inner: NamedThreadFactory::new("ingest-"),
            built: AtomicUsize::new(0),
        });
        let pool = PoolConfig::default().with_threads(2, 2).with_queue_capacity(4);
        let executor =
            TaskExecutor::with_factory(ExecutorConfig::default().with_pool(pool), factory.clone())
                .unwrap();

        let barrier = Arc::new(Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let barrier = barrier.clone();
                executor.submit(move || {
                    barrier.wait();
                    Ok(thread::current().name().unwrap_or_default().starts_with("ingest-"))
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.wait().unwrap());
        }
        assert_eq!(factory.built.load(Ordering::SeqCst), 2);
        executor.shutdown();
    }

    #[test]
    fn test_idle_overflow_thread_retires_after_keep_alive() {
        logging::init_test();
        let pool = PoolConfig::default()
            .with_threads(1, 2)
            .with_queue_capacity(1)
            .with_keep_alive(Duration::from_millis(50));
        let executor = TaskExecutor::new(ExecutorConfig::default().with_pool(pool)).unwrap();
        let (release_tx, release_rx) = flume::bounded::<()>(0);

        for _ in 0..3 {
            let release = release_rx.clone();
            executor.execute_job(job(move || {
                let _ = release.recv();
            }));
        }
        assert_eq!(executor.status().threads, 2);

        drop(release_tx);
        assert!(eventually(|| executor.status().threads == 1));

        // The core thread never times out.
        thread::sleep(Duration::from_millis(200));
        assert_eq!(executor.status().threads, 1);
        assert_eq!(executor.status().largest_threads, 2);
        executor.shutdown();
    }

    #[test]
    fn test_failures_do_not_kill_the_worker() {
        let executor = executor(1, 1, 10);

        let failed = executor.submit(|| -> anyhow::Result<()> { anyhow::bail!("bad checksum") });
        let panicked = executor.execute(|| panic!("index 9 out of range"));
        let healthy = executor.submit(|| Ok(thread::current().name().unwrap_or_default().to_string()));

        assert!(matches!(failed.wait(), Err(TaskError::Failed { .. })));
        match panicked.wait() {
            Err(TaskError::Panicked { message }) => assert_eq!(message, "index 9 out of range"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(healthy.wait().unwrap(), "Pool-1");

        assert!(eventually(|| executor.status().completed == 3));
        let status = executor.status();
        assert_eq!(status.failed, 2);
        assert_eq!(status.threads, 1);
        executor.shutdown();
    }

    #[test]
    fn test_raw_job_panic_is_contained() {
        let executor = executor(1, 1, 10);
        executor.execute_job(job(|| panic!("raw job blew up")));

        let after = executor.submit(|| Ok(1 + 1));
        assert_eq!(after.wait().unwrap(), 2);
        assert!(eventually(|| executor.status().failed == 1));
        executor.shutdown();
    }

    #[test]
    fn test_submit_all_waits_for_last_task() {
        let executor = executor(2, 2, 10);
        let (open_tx, open_rx) = flume::bounded::<()>(0);
        let (done_tx, done_rx) = mpsc::channel();
        let finished = Arc::new(AtomicUsize::new(0));

        let tasks = (0..4).map(|n| {
            let open = open_rx.clone();
            let done = done_tx.clone();
            let finished = finished.clone();
            move || {
                if n == 3 {
                    let _ = open.recv();
                }
                finished.fetch_add(1, Ordering::SeqCst);
                done.send(n).unwrap();
                anyhow::Ok(n)
            }
        });
        let aggregate = executor.submit_all(tasks);

        for _ in 0..3 {
            done_rx.recv().unwrap();
        }
        thread::sleep(Duration::from_millis(20));
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert!(!aggregate.is_resolved());

        drop(open_tx);
        assert!(aggregate.wait_timeout(Duration::from_secs(5)).is_ok());
        assert_eq!(finished.load(Ordering::SeqCst), 4);
        executor.shutdown();
    }

    #[test]
    fn test_status_display() {
        let executor = executor(2, 4, 8);
        executor.submit(|| Ok(())).wait().unwrap();

        let status = executor.status();
        assert_eq!(status.phase, ShutdownPhase::Running);
        let line = status.to_string();
        assert!(line.contains("Queue: 0/8"));
        assert!(line.contains("Threads: 1/4 (core 2, peak 1)"));
        assert!(line.ends_with("Phase: running"));

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["phase"], "running");
        assert_eq!(json["core_threads"], 2);
        executor.shutdown();
    }

    #[tokio::test]
    async fn test_handle_awaited_from_async_code() {
        let executor = executor(2, 2, 4);
        let handle = executor
            .submit(|| {
                thread::sleep(Duration::from_millis(10));
                Ok("computed")
            })
            .context("async caller");

        assert_eq!(handle.await.unwrap(), "computed");
        executor.shutdown();
    }
}
