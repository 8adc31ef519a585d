// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Text-injector task: erases the typed trigger and types the expansion
//!
//! A single worker owns injection so expansions never interleave.

use std::sync::Arc;
use std::thread;

use tracing::info;

use crate::context::DependencyContext;
use crate::error::TaskError;
use crate::worker::{WorkOutcome, WorkerTask};

pub struct InjectionWorker {
    context: Arc<DependencyContext>,
}

impl InjectionWorker {
    pub fn new(context: Arc<DependencyContext>) -> Self {
        Self { context }
    }
}

impl WorkerTask for InjectionWorker {
    fn run_once(&mut self) -> Result<WorkOutcome, TaskError> {
        let Some(job) = self.context.next_injection() else {
            return Ok(WorkOutcome::Idle);
        };
        let metrics = &self.context.metrics;
        let mut injector = self.context.injector.lock();

        // Trigger plus the terminator that completed it
        let erase = job.trigger.chars().count() + 1;
        if !injector.delete_previous_chars(erase) {
            metrics.record_injection_failure();
            return Err(TaskError::Recoverable(format!(
                "Failed to delete shortcut '{}': {}",
                job.trigger,
                injector.last_error().unwrap_or_else(|| "unknown error".to_string())
            )));
        }

        if !self.context.expansion_delay.is_zero() {
            thread::sleep(self.context.expansion_delay);
        }

        if !injector.inject(&job.text) {
            metrics.record_injection_failure();
            return Err(TaskError::Recoverable(format!(
                "Failed to inject expansion of '{}': {}",
                job.trigger,
                injector.last_error().unwrap_or_else(|| "unknown error".to_string())
            )));
        }
        drop(injector);

        metrics.record_expansion(job.detected_at.elapsed());
        let preview: String = job.text.chars().take(50).collect();
        info!(
            "[INJECTOR] Expanded '{}' to '{}{}' ({} chars)",
            job.trigger,
            preview,
            if job.text.chars().count() > 50 { "..." } else { "" },
            job.text.chars().count()
        );
        Ok(WorkOutcome::Worked)
    }
}
