//! # Logging Initialization
//!
//! Sets up the `tracing` subscriber: console output always, plus a
//! non-blocking file sink when `LoggerSettings.FilePath` is configured.
//! Filtering follows `RUST_LOG` when set and defaults to info-level gateway
//! logs otherwise.

use crate::core::config::LoggerSettings;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber
///
/// Returns the file writer's guard when file logging is active; the caller
/// must hold it for the process lifetime or buffered lines are lost on exit.
pub fn init_logging(settings: &LoggerSettings) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "bus_gateway=info,tower_http=warn".into());

    if settings.file_path.trim().is_empty() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true))
            .init();
        return None;
    }

    let path = Path::new(&settings.file_path);
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "gateway.log".to_string());

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(directory, file_name));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    Some(guard)
}
