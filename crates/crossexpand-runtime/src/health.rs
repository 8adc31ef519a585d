// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Health supervision
//!
//! The [`HealthMonitor`] runs as a pool worker. Every check interval it
//! samples the event queue, the pipeline counters and its sibling workers,
//! publishes a [`HealthReport`], and restarts siblings that have died.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use crossexpand_config::HealthConfig;
use crossexpand_event_queue::QueueStats;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::context::DependencyContext;
use crate::error::TaskError;
use crate::metrics::PipelineSnapshot;
use crate::worker::{WorkOutcome, Worker, WorkerSnapshot, WorkerState, WorkerTask};

/// Hot-reloadable thresholds for the health verdict
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HealthThresholds {
    pub check_interval: Duration,
    pub max_queue_utilization: f64,
    pub min_success_rate: f64,
    pub max_response_time: Duration,
    /// Restart attempts allowed per worker over the pool lifetime
    pub max_restart_attempts: u32,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self::from(&HealthConfig::default())
    }
}

impl From<&HealthConfig> for HealthThresholds {
    fn from(config: &HealthConfig) -> Self {
        Self {
            check_interval: config.check_interval(),
            max_queue_utilization: config.max_queue_utilization,
            min_success_rate: config.min_success_rate,
            max_response_time: config.max_response_time(),
            max_restart_attempts: config.max_restart_attempts,
        }
    }
}

/// Overall system health
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Healthy,
    /// A performance threshold is breached
    Degraded,
    /// The queue is unhealthy or a worker has failed
    Unhealthy,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verdict::Healthy => "healthy",
            Verdict::Degraded => "degraded",
            Verdict::Unhealthy => "unhealthy",
        })
    }
}

/// Inputs to one health check
#[derive(Debug, Clone)]
pub struct HealthSample {
    pub queue: QueueStats,
    pub queue_utilization: f64,
    pub queue_healthy: bool,
    pub pipeline: PipelineSnapshot,
    pub workers: Vec<WorkerSnapshot>,
}

/// Outcome of one health check
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub verdict: Verdict,
    pub queue_utilization: f64,
    pub queue_healthy: bool,
    pub queued_events: usize,
    pub dropped_events: u64,
    pub success_rate: f64,
    pub average_response_time: Duration,
    pub active_workers: usize,
    pub failed_workers: Vec<String>,
    /// Human-readable reason for every failed check
    pub issues: Vec<String>,
}

impl HealthReport {
    pub fn evaluate(sample: &HealthSample, thresholds: &HealthThresholds) -> Self {
        let mut verdict = Verdict::Healthy;
        let mut issues = Vec::new();

        if sample.queue_utilization > thresholds.max_queue_utilization {
            verdict = verdict.max(Verdict::Degraded);
            issues.push(format!(
                "queue utilization {:.1}% above {:.1}%",
                sample.queue_utilization * 100.0,
                thresholds.max_queue_utilization * 100.0
            ));
        }
        if sample.pipeline.success_rate < thresholds.min_success_rate {
            verdict = verdict.max(Verdict::Degraded);
            issues.push(format!(
                "expansion success rate {:.1}% below {:.1}%",
                sample.pipeline.success_rate * 100.0,
                thresholds.min_success_rate * 100.0
            ));
        }
        if sample.pipeline.average_response_time > thresholds.max_response_time {
            verdict = verdict.max(Verdict::Degraded);
            issues.push(format!(
                "average response time {:?} above {:?}",
                sample.pipeline.average_response_time, thresholds.max_response_time
            ));
        }
        if !sample.queue_healthy {
            verdict = Verdict::Unhealthy;
            issues.push(format!(
                "event queue unhealthy ({} dropped, drop rate {:.2}%)",
                sample.queue.total_dropped,
                sample.queue.drop_rate() * 100.0
            ));
        }

        let failed_workers: Vec<String> = sample
            .workers
            .iter()
            .filter(|w| w.state == WorkerState::Failed)
            .map(|w| w.name.clone())
            .collect();
        if !failed_workers.is_empty() {
            verdict = Verdict::Unhealthy;
            issues.push(format!("failed workers: {}", failed_workers.join(", ")));
        }

        Self {
            verdict,
            queue_utilization: sample.queue_utilization,
            queue_healthy: sample.queue_healthy,
            queued_events: sample.queue.total_size(),
            dropped_events: sample.queue.total_dropped,
            success_rate: sample.pipeline.success_rate,
            average_response_time: sample.pipeline.average_response_time,
            active_workers: sample.workers.iter().filter(|w| w.running).count(),
            failed_workers,
            issues,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.verdict == Verdict::Healthy
    }
}

/// Health-monitor worker task
pub struct HealthMonitor {
    name: String,
    context: Arc<DependencyContext>,
    workers: Weak<Mutex<Vec<Worker>>>,
    pool_running: Arc<AtomicBool>,
    last_check: Instant,
    /// Workers whose restart budget is spent (logged once)
    exhausted: HashSet<String>,
}

impl HealthMonitor {
    pub fn new(
        name: impl Into<String>,
        context: Arc<DependencyContext>,
        workers: Weak<Mutex<Vec<Worker>>>,
        pool_running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            name: name.into(),
            context,
            workers,
            pool_running,
            last_check: Instant::now(),
            exhausted: HashSet::new(),
        }
    }

    fn check(&mut self, workers: &mut [Worker]) -> HealthReport {
        let thresholds = *self.context.thresholds.read();
        let sample = HealthSample {
            queue: self.context.queue.get_stats(),
            queue_utilization: self.context.queue.utilization(),
            queue_healthy: self.context.queue.is_healthy(),
            pipeline: self.context.metrics.snapshot(),
            workers: workers
                .iter()
                .filter(|w| w.name() != self.name)
                .map(Worker::snapshot)
                .collect(),
        };
        let report = HealthReport::evaluate(&sample, &thresholds);

        let summary = format!(
            "queue {:.1}% ({} queued, {} dropped), success {:.1}%, response {:?}, {}/{} workers active",
            report.queue_utilization * 100.0,
            report.queued_events,
            report.dropped_events,
            report.success_rate * 100.0,
            report.average_response_time,
            report.active_workers,
            sample.workers.len()
        );
        match report.verdict {
            Verdict::Healthy => info!("[HEALTH] {}: {}", report.verdict, summary),
            _ => warn!(
                "[HEALTH] {}: {} | {}",
                report.verdict,
                summary,
                report.issues.join("; ")
            ),
        }

        if self.pool_running.load(Ordering::Acquire) {
            self.restart_dead_workers(workers, thresholds.max_restart_attempts);
        }
        report
    }

    /// One attempt per dead worker per check, within the lifetime budget
    fn restart_dead_workers(&mut self, workers: &mut [Worker], max_attempts: u32) {
        for worker in workers.iter_mut().filter(|w| w.name() != self.name) {
            if !worker.state().is_terminal() {
                continue;
            }
            if worker.restarts() >= max_attempts {
                if self.exhausted.insert(worker.name().to_string()) {
                    error!(
                        "[HEALTH] Worker {} is {} after {} restart attempts; giving up",
                        worker.name(),
                        worker.state(),
                        worker.restarts()
                    );
                }
                continue;
            }

            warn!("[HEALTH] Worker {} is {}; restarting", worker.name(), worker.state());
            match worker.restart() {
                Ok(()) => info!("[HEALTH] Worker {} restarted", worker.name()),
                Err(e) => error!("[HEALTH] Restart of {} failed: {}", worker.name(), e),
            }
        }
    }
}

impl WorkerTask for HealthMonitor {
    fn run_once(&mut self) -> Result<WorkOutcome, TaskError> {
        let interval = self.context.thresholds.read().check_interval;
        if self.last_check.elapsed() < interval {
            return Ok(WorkOutcome::Idle);
        }
        self.last_check = Instant::now();

        let Some(registry) = self.workers.upgrade() else {
            debug!("[HEALTH] Worker registry gone; skipping check");
            return Ok(WorkOutcome::Idle);
        };
        let report = {
            let mut workers = registry.lock();
            self.check(&mut workers)
        };
        *self.context.last_health_report.write() = Some(report);
        Ok(WorkOutcome::Worked)
    }
}
