//! Centralized file-based logging system
//!
//! Writes logs to files in the configured directory, separated by log type:
//! - main/    - all events (JSON)
//! - error/   - warnings and errors only
//! - node/    - node lifecycle, queues and buffers
//! - monitor/ - monitoring registration and polling

use crate::infrastructure::config::LoggingConfig;
use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

const LOG_TYPES: [&str; 4] = ["main", "error", "node", "monitor"];

/// Initialize centralized file logging
///
/// Creates the log directory tree and sets up file appenders for each log
/// type. The returned guards must be kept alive for the duration of the
/// program.
pub fn init_logging(config: &LoggingConfig) -> io::Result<Vec<WorkerGuard>> {
    for log_type in LOG_TYPES {
        fs::create_dir_all(config.dir.join(log_type))?;
    }

    let mut guards = Vec::new();

    let (main_appender, main_guard) = create_appender(&config.dir, "main");
    guards.push(main_guard);

    let (error_appender, error_guard) = create_appender(&config.dir, "error");
    guards.push(error_guard);

    let (node_appender, node_guard) = create_appender(&config.dir, "node");
    guards.push(node_guard);

    let (monitor_appender, monitor_guard) = create_appender(&config.dir, "monitor");
    guards.push(monitor_guard);

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json();

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    let node_layer = tracing_subscriber::fmt::layer()
        .with_writer(node_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target().starts_with("node")
                || metadata.target().contains("cache_node::node")
        }));

    let monitor_layer = tracing_subscriber::fmt::layer()
        .with_writer(monitor_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::filter_fn(|metadata| {
            metadata.target().starts_with("monitor")
                || metadata.target().contains("cache_node::monitor")
        }));

    // Console layer for development
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(main_layer)
        .with(error_layer)
        .with(node_layer)
        .with(monitor_layer)
        .with(console_layer)
        .init();

    tracing::info!(dir = %config.dir.display(), "Logging system initialized");

    Ok(guards)
}

/// Create a daily rolling file appender under `dir/name`
fn create_appender(dir: &Path, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, dir.join(name), name);

    tracing_appender::non_blocking(appender)
}

/// Log macro helpers for specific log types
#[macro_export]
macro_rules! log_node {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "node", $level, $($arg)+)
    };
}

#[macro_export]
macro_rules! log_monitor {
    ($level:expr, $($arg:tt)+) => {
        tracing::event!(target: "monitor", $level, $($arg)+)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_directory_layout() {
        let test_dir = std::env::temp_dir().join(format!("cache_node_logs_{}", std::process::id()));
        if test_dir.exists() {
            fs::remove_dir_all(&test_dir).ok();
        }

        for log_type in LOG_TYPES {
            fs::create_dir_all(test_dir.join(log_type)).unwrap();
        }
        assert!(test_dir.join("node").exists());
        assert!(test_dir.join("monitor").exists());

        fs::remove_dir_all(&test_dir).ok();
    }

    #[test]
    fn test_log_macros_compile_without_subscriber() {
        log_node!(tracing::Level::DEBUG, node_id = 1, "node event");
        log_monitor!(tracing::Level::DEBUG, "monitor event");
    }
}
