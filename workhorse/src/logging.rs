// Structured logging for Workhorse.
//
// Everything the crate logs goes through `tracing`. Pool events carry a
// `pool_id` field and worker events run on threads named after the pool's
// prefix, so one subscriber can serve several pools in a process.
//
// ```rust
// use workhorse::logging::{self, LogConfig};
//
// // DEBUG, worker lifecycle at TRACE, source locations
// logging::init_development();
//
// // JSON lines for a log collector
// logging::init(LogConfig { json_format: true, ..LogConfig::default() });
// ```
//
// `RUST_LOG` directives are honoured on top of the configured level.

use std::sync::Once;
use tracing::{Level, Subscriber};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Subscriber settings applied by [`init`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    /// One JSON object per event instead of human-readable lines
    pub json_format: bool,
    pub show_file_line: bool,
    /// Thread names identify the pool a worker belongs to
    pub show_thread_info: bool,
    pub show_time: bool,
    /// Extra directives, e.g. "workhorse::thread=trace,tokio=warn"
    pub target_filters: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            show_file_line: true,
            show_thread_info: true,
            show_time: true,
            target_filters: None,
        }
    }
}

static INSTALLED: Once = Once::new();

fn env_filter(config: &LogConfig) -> EnvFilter {
    let directives = config.target_filters.as_deref().unwrap_or_default();
    directives
        .split(',')
        .map(str::trim)
        .filter(|directive| !directive.is_empty())
        .filter_map(|directive| directive.parse().ok())
        .fold(
            EnvFilter::from_default_env().add_directive(config.level.into()),
            EnvFilter::add_directive,
        )
}

/// Install the global subscriber.
///
/// Only the first call of any `init*` function in the process installs
/// anything; later calls are ignored.
pub fn init(config: LogConfig) {
    INSTALLED.call_once(|| {
        let registry = tracing_subscriber::registry().with(env_filter(&config));

        let subscriber: Box<dyn Subscriber + Send + Sync> = if config.json_format {
            let layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_thread_names(config.show_thread_info);
            Box::new(registry.with(layer))
        } else {
            let layer = fmt::layer()
                .with_ansi(atty::is(atty::Stream::Stdout))
                .with_file(config.show_file_line)
                .with_line_number(config.show_file_line)
                .with_thread_names(config.show_thread_info)
                .with_thread_ids(config.show_thread_info);
            if config.show_time {
                Box::new(registry.with(layer))
            } else {
                Box::new(registry.with(layer.without_time()))
            }
        };

        if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Error setting global tracing subscriber: {}", err);
        }
    });
}

/// DEBUG for the crate and TRACE for worker threads.
pub fn init_development() {
    init(LogConfig {
        level: Level::DEBUG,
        target_filters: Some("workhorse=debug,workhorse::thread=trace".to_string()),
        ..LogConfig::default()
    });
}

/// Warnings and errors only, without timestamps or thread info.
pub fn init_test() {
    init(LogConfig {
        level: Level::WARN,
        show_thread_info: false,
        show_time: false,
        ..LogConfig::default()
    });
}

/// Log a pool lifecycle event.
///
/// ```rust,ignore
/// workhorse::log_pool!(executor.id(), "started", core_threads = 4);
/// ```
#[macro_export]
macro_rules! log_pool {
    ($pool_id:expr, $event:expr) => {
        tracing::info!(pool_id = %$pool_id, event = $event)
    };
    ($pool_id:expr, $event:expr, $($fields:tt)*) => {
        tracing::info!(pool_id = %$pool_id, event = $event, $($fields)*)
    };
}

/// Log a task failure read from a handle outside the pool.
///
/// ```rust,ignore
/// if let Err(err) = handle.wait() {
///     workhorse::log_task_failure!(err, task = "nightly-report");
/// }
/// ```
#[macro_export]
macro_rules! log_task_failure {
    ($error:expr) => {
        tracing::error!(error = %$error, "Task failed")
    };
    ($error:expr, $($fields:tt)*) => {
        tracing::error!(error = %$error, $($fields)*, "Task failed")
    };
}

pub use tracing::{debug, error, info, trace, warn};
