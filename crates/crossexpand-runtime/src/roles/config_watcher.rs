// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Config-watcher task
//!
//! Polls the configuration file's modification time. A changed file is
//! reloaded and validated; on success the health thresholds and shortcut
//! table are republished. Invalid files are logged and the previous values
//! stay in effect.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use crossexpand_config::{load_config, validate_config};
use tracing::{info, warn};

use crate::context::DependencyContext;
use crate::error::TaskError;
use crate::health::HealthThresholds;
use crate::worker::{WorkOutcome, WorkerTask};

pub struct ConfigWatcher {
    context: Arc<DependencyContext>,
    path: Option<PathBuf>,
    poll_interval: Duration,
    last_poll: Instant,
    last_modified: Option<SystemTime>,
    missing_logged: bool,
}

impl ConfigWatcher {
    /// Watch `path`; with `None` the watcher stays idle
    pub fn new(context: Arc<DependencyContext>, path: Option<PathBuf>, poll_interval: Duration) -> Self {
        let last_modified = path.as_ref().and_then(|p| modified_time(p));
        Self {
            context,
            path,
            poll_interval,
            last_poll: Instant::now(),
            last_modified,
            missing_logged: false,
        }
    }

    fn reload(&self, path: &Path) -> Result<(), TaskError> {
        let config = load_config(Some(path), None)
            .map_err(|e| TaskError::Recoverable(format!("Config reload failed: {}", e)))?;
        validate_config(&config)
            .map_err(|e| TaskError::Recoverable(format!("Reloaded config rejected: {}", e)))?;

        let thresholds = HealthThresholds::from(&config.health);
        *self.context.thresholds.write() = thresholds;
        if !config.shortcuts.is_empty() {
            self.context.lookup.reload(&config.shortcuts);
        }

        info!(
            "[CONFIG] Reloaded {} (health interval {:?}, {} shortcuts)",
            path.display(),
            thresholds.check_interval,
            config.shortcuts.len()
        );
        Ok(())
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl WorkerTask for ConfigWatcher {
    fn run_once(&mut self) -> Result<WorkOutcome, TaskError> {
        let Some(path) = self.path.clone() else {
            return Ok(WorkOutcome::Idle);
        };
        if self.last_poll.elapsed() < self.poll_interval {
            return Ok(WorkOutcome::Idle);
        }
        self.last_poll = Instant::now();

        let Some(modified) = modified_time(&path) else {
            if !self.missing_logged {
                warn!("[CONFIG] {} is not readable; keeping current settings", path.display());
                self.missing_logged = true;
            }
            return Ok(WorkOutcome::Idle);
        };
        self.missing_logged = false;

        if self.last_modified == Some(modified) {
            return Ok(WorkOutcome::Idle);
        }
        // Recorded before reloading so a broken file is reported once
        self.last_modified = Some(modified);

        self.reload(&path)?;
        Ok(WorkOutcome::Worked)
    }
}
