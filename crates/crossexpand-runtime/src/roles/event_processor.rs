// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Event-processor task
//!
//! Pops one event, feeds the shared sequence tracker and, when a known
//! trigger completes, resolves it and hands the text to the injector worker.
//! Pop and feed happen under the tracker lock; lookup and hand-off do not.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::context::{DependencyContext, InjectionJob};
use crate::error::TaskError;
use crate::services::ExpansionContext;
use crate::worker::{WorkOutcome, WorkerTask};

pub struct EventProcessor {
    context: Arc<DependencyContext>,
}

impl EventProcessor {
    pub fn new(context: Arc<DependencyContext>) -> Self {
        Self { context }
    }

    fn expand(&self, trigger: String) -> Result<(), TaskError> {
        let detected_at = Instant::now();
        let metrics = &self.context.metrics;
        metrics.record_lookup();

        let text = match self.context.lookup.expand(&trigger, &ExpansionContext::new()) {
            Ok(text) if !text.is_empty() => text,
            Ok(_) => {
                metrics.record_lookup_failure();
                return Err(TaskError::Recoverable(format!(
                    "Expansion of '{}' returned empty text",
                    trigger
                )));
            }
            Err(e) => {
                metrics.record_lookup_failure();
                return Err(TaskError::Recoverable(format!("Lookup of '{}' failed: {}", trigger, e)));
            }
        };

        debug!("[PROCESSOR] Trigger '{}' resolved ({} chars)", trigger, text.chars().count());
        self.context
            .submit_injection(InjectionJob {
                trigger,
                text,
                detected_at,
            })
            .map_err(|job| {
                metrics.record_injection_failure();
                TaskError::Recoverable(format!(
                    "Injection backlog full; dropped expansion of '{}'",
                    job.trigger
                ))
            })
    }
}

impl WorkerTask for EventProcessor {
    fn run_once(&mut self) -> Result<WorkOutcome, TaskError> {
        let trigger = {
            let mut tracker = self.context.sequence.lock();
            let Some(event) = self.context.queue.pop() else {
                return Ok(WorkOutcome::Idle);
            };
            match tracker.feed(&event.payload) {
                Some(candidate) if self.context.lookup.contains(&candidate) => {
                    tracker.clear();
                    Some(candidate)
                }
                _ => None,
            }
        };

        if let Some(trigger) = trigger {
            self.expand(trigger)?;
        }
        Ok(WorkOutcome::Worked)
    }
}
