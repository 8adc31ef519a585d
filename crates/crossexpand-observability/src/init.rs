// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unified logging initialization
//!
//! Console output is always installed; with the `file-logging` feature and a
//! log directory, a daily-rolling JSON file layer is added.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

/// Log file name inside the log directory
pub const LOG_FILE_NAME: &str = "crossexpand.log";

/// Logging settings, usually mapped from the `[logging]` config section
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Default level for crates without a debug flag
    pub level: String,
    /// Directory for rolling log files
    pub log_dir: Option<PathBuf>,
    /// Include the event target (module path) in console output
    pub with_target: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            with_target: false,
        }
    }
}

/// Keeps background log writers alive; flushes on drop
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Directory receiving log files, if file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Install the global tracing subscriber
///
/// # Errors
///
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed.
pub fn init_logging(settings: &LoggingSettings, debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string(&settings.level);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(settings.with_target)
        .with_thread_names(true)
        .with_filter(EnvFilter::new(&filter))
        .boxed();

    #[allow(unused_mut)]
    let mut layers = vec![console_layer];

    #[cfg(feature = "file-logging")]
    let mut file_guard = None;
    #[cfg(feature = "file-logging")]
    let mut active_log_dir = None;

    #[cfg(feature = "file-logging")]
    if let Some(dir) = &settings.log_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory: {}", dir.display()))?;

        let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);
        active_log_dir = Some(dir.clone());

        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true)
                .with_filter(EnvFilter::new(&filter))
                .boxed(),
        );
    }

    Registry::default()
        .with(layers)
        .try_init()
        .context("Global tracing subscriber already installed")?;

    #[cfg(not(feature = "file-logging"))]
    if let Some(dir) = &settings.log_dir {
        tracing::warn!(
            "log_dir {} ignored: built without the file-logging feature",
            dir.display()
        );
    }

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guard: file_guard,
        #[cfg(feature = "file-logging")]
        log_dir: active_log_dir,
        #[cfg(not(feature = "file-logging"))]
        log_dir: None,
    })
}

/// Initialize console logging at `info` with the given debug flags
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(&LoggingSettings::default(), debug_flags)
}
