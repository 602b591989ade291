// Runs a handful of tasks through a pool and then waits for Ctrl+C.
//
// Pool sizing comes from the WORKHORSE_* environment variables, e.g.
//
//     WORKHORSE_CORE_THREADS=2 WORKHORSE_QUEUE_CAPACITY=4 cargo run --bin workhorse-demo

use std::thread;
use std::time::Duration;

use anyhow::Context;
use workhorse::logging::{self, info};
use workhorse::{Executor, ExecutorConfig, ExecutorExt, TaskExecutor, log_task_failure};

fn main() -> anyhow::Result<()> {
    logging::init_development();

    let config = ExecutorConfig::from_env().context("Invalid WORKHORSE_* configuration")?;
    let executor = TaskExecutor::new(config)?;

    let squares: Vec<_> = (1..=8_u64)
        .map(|n| {
            executor.submit(move || {
                thread::sleep(Duration::from_millis(50));
                Ok(n * n)
            })
        })
        .collect();

    let failing = executor
        .submit(|| -> anyhow::Result<()> { anyhow::bail!("upstream returned 503") })
        .context("refresh cache");

    let batch = executor.submit_all((0..16_u64).map(|n| {
        move || {
            thread::sleep(Duration::from_millis(10 * (n % 4)));
            anyhow::Ok(n)
        }
    }));

    let total: u64 = squares
        .into_iter()
        .map(|handle| handle.wait())
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .sum();
    info!(total, "Sum of squares computed");

    if let Err(err) = failing.wait() {
        log_task_failure!(err, task = "refresh cache");
    }
    batch.wait()?;

    info!(status = %executor.status(), "Work finished, press Ctrl+C to shut down");

    let report = executor.wait_indefinitely()?;
    info!(
        graceful = report.graceful,
        elapsed = ?report.elapsed,
        "Executor terminated"
    );
    Ok(())
}
