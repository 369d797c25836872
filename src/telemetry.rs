//! Global subscriber management driven by the `log.out` setting.

use std::any::type_name_of_val;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;
use thiserror::Error;
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::Layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

/// `log.out` value selecting human-readable developer output on stderr.
pub const CONSOLE_TARGET: &str = "console";

/// Errors that can occur while initializing global telemetry.
#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to install log tracer bridge: {0}")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
    #[error("failed to open log file {}: {source}", .path.display())]
    LogFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Where formatted events are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Console,
    File(PathBuf),
}

impl LogTarget {
    pub fn from_config(config: &AppConfig) -> Self {
        if config.log.out == CONSOLE_TARGET {
            LogTarget::Console
        } else {
            LogTarget::File(PathBuf::from(&config.log.out))
        }
    }

    /// Level used when `RUST_LOG` is not set.
    pub fn default_level(&self) -> &'static str {
        match self {
            LogTarget::Console => "debug",
            LogTarget::File(_) => "info",
        }
    }
}

static TELEMETRY_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initialize global tracing/logging exactly once, wiring `log::` macros into the tracing pipeline.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    let target = LogTarget::from_config(config);

    // Open the file before claiming the init flag so a bad path can be retried.
    let log_file = match &target {
        LogTarget::Console => None,
        LogTarget::File(path) => Some(open_log_file(path)?),
    };

    if TELEMETRY_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }

    // Install log bridge first so legacy `log::` macros route through tracing.
    if let Err(err) = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init()
    {
        let logger_type = type_name_of_val(log::logger());
        if !logger_type.contains("LogTracer") {
            eprintln!(
                "Warning: Failed to install log tracer bridge: {}. legacy `log::` macros will not emit structured tracing events.",
                err
            );
        }
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(target.default_level()));

    let fmt_layer = match log_file {
        None => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        Some(file) => fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .boxed(),
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        TELEMETRY_INITIALIZED.store(false, Ordering::SeqCst);
        return Err(err.into());
    }

    Ok(())
}

fn open_log_file(path: &Path) -> Result<File, TelemetryInitError> {
    let to_error = |source: std::io::Error| TelemetryInitError::LogFile {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(to_error)?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_error)
}
