// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Worker pool orchestration
//!
//! Topology, in start order:
//!
//! ```text
//! input-monitor ──▶ EventQueue ──▶ event-processor-0..K ──▶ text-injector
//!                                         ▲
//!           health-monitor (optional) ────┤ observes queue + siblings
//!           config-watcher ───────────────┘ republishes thresholds
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossexpand_config::CrossExpandConfig;
use crossexpand_event_queue::{EventQueue, QueueStats};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::context::{ContextParts, DependencyContext};
use crate::error::{PoolError, PoolResult, TaskError};
use crate::health::{HealthMonitor, HealthReport, HealthThresholds};
use crate::metrics::PipelineSnapshot;
use crate::roles::{ConfigWatcher, EventProcessor, InjectionWorker, InputMonitor};
use crate::sequence::SequenceSettings;
use crate::services::{DefaultClassifier, InputHook, PriorityClassifier, ShortcutLookup, TextInjector};
use crate::worker::{boxed_task, JoinOutcome, Worker, WorkerRole, WorkerSnapshot, WorkerTask, WorkerTiming};

/// Builds the task for event processor `index`
pub type ProcessorFactory =
    Arc<dyn Fn(Arc<DependencyContext>, usize) -> Result<Box<dyn WorkerTask>, TaskError> + Send + Sync>;

fn default_processor(context: Arc<DependencyContext>, _index: usize) -> Result<Box<dyn WorkerTask>, TaskError> {
    boxed_task(EventProcessor::new(context))
}

/// Pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Event processors to run (0 = host core count)
    pub processor_thread_count: usize,
    pub enable_health_monitoring: bool,
    /// Ring slots per priority (power of two)
    pub queue_slots_per_priority: usize,
    pub thresholds: HealthThresholds,
    pub timing: WorkerTiming,
    pub expansion_delay: Duration,
    /// Expansions allowed to wait for the text injector
    pub pending_injections: usize,
    pub sequence: SequenceSettings,
    /// File watched by the config watcher
    pub config_path: Option<PathBuf>,
    pub config_poll_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::from_config(&CrossExpandConfig::default())
    }
}

impl PoolConfig {
    pub fn from_config(config: &CrossExpandConfig) -> Self {
        Self {
            processor_thread_count: config.processing.processor_thread_count,
            enable_health_monitoring: config.processing.enable_health_monitoring,
            queue_slots_per_priority: config.queue.queue_capacity_per_priority,
            thresholds: HealthThresholds::from(&config.health),
            timing: WorkerTiming {
                idle_sleep: config.workers.idle_sleep(),
                start_timeout: config.workers.start_timeout(),
                join_timeout: config.workers.join_timeout(),
            },
            expansion_delay: config.injection.expansion_delay(),
            pending_injections: config.injection.pending_capacity,
            sequence: SequenceSettings::from(&config.input),
            config_path: None,
            config_poll_interval: config.workers.config_poll_interval(),
        }
    }

    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Processor count with auto-detection resolved
    pub fn effective_processor_count(&self) -> usize {
        if self.processor_thread_count == 0 {
            num_cpus::get().max(1)
        } else {
            self.processor_thread_count
        }
    }
}

/// External collaborators wired into the pool
pub struct PoolServices {
    pub input_hook: Box<dyn InputHook>,
    pub lookup: Arc<dyn ShortcutLookup>,
    pub injector: Box<dyn TextInjector>,
    pub classifier: Arc<dyn PriorityClassifier>,
}

impl PoolServices {
    pub fn new(
        input_hook: Box<dyn InputHook>,
        lookup: Arc<dyn ShortcutLookup>,
        injector: Box<dyn TextInjector>,
    ) -> Self {
        Self {
            input_hook,
            lookup,
            injector,
            classifier: Arc::new(DefaultClassifier),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn PriorityClassifier>) -> Self {
        self.classifier = classifier;
        self
    }
}

/// Aggregated pool statistics
#[derive(Debug, Clone, Serialize)]
pub struct SystemStats {
    pub total_threads: usize,
    pub active_threads: usize,
    /// Events handled by event processors
    pub total_events_processed: u64,
    pub total_expansions_performed: u64,
    pub events_per_second: f64,
    pub expansions_per_second: f64,
    /// Mean event-processor time per event
    pub average_processing_time: Duration,
    pub uptime_seconds: f64,
    pub queue: QueueStats,
    pub pipeline: PipelineSnapshot,
}

/// Supervised set of workers sharing one [`DependencyContext`]
pub struct WorkerPool {
    config: PoolConfig,
    context: Arc<DependencyContext>,
    workers: Arc<Mutex<Vec<Worker>>>,
    running: Arc<AtomicBool>,
    services_initialized: AtomicBool,
    started_at: Mutex<Option<Instant>>,
    processor_factory: ProcessorFactory,
    /// Held for the whole of `initialize()` and `shutdown()`
    lifecycle: Mutex<()>,
}

impl WorkerPool {
    /// Build the pool and its event queue; no threads start until
    /// [`WorkerPool::initialize`]
    ///
    /// # Errors
    ///
    /// `PoolError::Queue` if the ring size is not a power of two
    pub fn new(config: PoolConfig, services: PoolServices) -> PoolResult<Self> {
        let queue = Arc::new(EventQueue::with_capacity(config.queue_slots_per_priority)?);
        let context = Arc::new(DependencyContext::new(ContextParts {
            queue,
            lookup: services.lookup,
            injector: services.injector,
            input_hook: services.input_hook,
            classifier: services.classifier,
            thresholds: config.thresholds,
            sequence: config.sequence,
            expansion_delay: config.expansion_delay,
            pending_injections: config.pending_injections,
        }));

        Ok(Self {
            config,
            context,
            workers: Arc::new(Mutex::new(Vec::new())),
            running: Arc::new(AtomicBool::new(false)),
            services_initialized: AtomicBool::new(false),
            started_at: Mutex::new(None),
            processor_factory: Arc::new(default_processor),
            lifecycle: Mutex::new(()),
        })
    }

    pub fn queue(&self) -> Arc<EventQueue> {
        Arc::clone(&self.context.queue)
    }

    pub fn context(&self) -> &Arc<DependencyContext> {
        &self.context
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn ensure_configurable(&self, setting: &str) -> PoolResult<()> {
        if self.is_running() || !self.workers.lock().is_empty() {
            return Err(PoolError::InvalidState(format!(
                "{} can only be changed before initialize()",
                setting
            )));
        }
        Ok(())
    }

    pub fn set_processor_thread_count(&mut self, count: usize) -> PoolResult<()> {
        self.ensure_configurable("processor_thread_count")?;
        self.config.processor_thread_count = count;
        Ok(())
    }

    pub fn enable_health_monitoring(&mut self, enabled: bool) -> PoolResult<()> {
        self.ensure_configurable("enable_health_monitoring")?;
        self.config.enable_health_monitoring = enabled;
        Ok(())
    }

    /// Replace the event-processor task (before `initialize()`)
    pub fn set_processor_factory(&mut self, factory: ProcessorFactory) -> PoolResult<()> {
        self.ensure_configurable("processor factory")?;
        self.processor_factory = factory;
        Ok(())
    }

    /// Initialize external services, then build and start every worker
    ///
    /// A no-op on a running pool. On failure everything that did start is
    /// shut down before the error is returned. A concurrent `shutdown()`
    /// waits for startup to finish; a concurrent `stop()` aborts it.
    ///
    /// # Errors
    ///
    /// `PoolError::Service` if a service fails to initialize,
    /// `PoolError::Worker` if a worker fails to start,
    /// `PoolError::InvalidState` if the pool was stopped during startup
    pub fn initialize(&self) -> PoolResult<()> {
        let _lifecycle = self.lifecycle.lock();
        if self.is_running() {
            debug!("[POOL] Already running");
            return Ok(());
        }

        info!(
            "[POOL] Initializing with {} event processors (health monitoring {})",
            self.config.effective_processor_count(),
            if self.config.enable_health_monitoring { "on" } else { "off" }
        );

        if let Err(e) = self.initialize_services() {
            error!("[POOL] {}", e);
            self.shutdown_locked();
            return Err(e);
        }

        self.running.store(true, Ordering::Release);
        *self.started_at.lock() = Some(Instant::now());

        if let Err(e) = self.start_topology() {
            error!("[POOL] Startup failed: {}", e);
            self.shutdown_locked();
            return Err(e);
        }

        info!("[POOL] Started {} workers", self.workers.lock().len());
        Ok(())
    }

    fn initialize_services(&self) -> PoolResult<()> {
        self.services_initialized.store(true, Ordering::Release);
        self.context.lookup.initialize()?;
        self.context.injector.lock().initialize()?;
        self.context.input_hook.lock().initialize()?;
        Ok(())
    }

    fn start_topology(&self) -> PoolResult<()> {
        for mut worker in self.build_topology() {
            let started = worker.start();
            // Kept even on failure so shutdown reclaims its thread
            self.workers.lock().push(worker);
            started?;
            if !self.is_running() {
                return Err(PoolError::InvalidState("pool stopped during startup".to_string()));
            }
        }
        Ok(())
    }

    fn build_topology(&self) -> Vec<Worker> {
        let timing = self.config.timing;
        let mut workers = Vec::new();

        let context = Arc::clone(&self.context);
        workers.push(Worker::new(
            WorkerRole::InputMonitor.as_str(),
            WorkerRole::InputMonitor,
            timing,
            Box::new(move || boxed_task(InputMonitor::new(Arc::clone(&context)))),
        ));

        for index in 0..self.config.effective_processor_count() {
            let context = Arc::clone(&self.context);
            let factory = Arc::clone(&self.processor_factory);
            workers.push(Worker::new(
                format!("{}-{}", WorkerRole::EventProcessor, index),
                WorkerRole::EventProcessor,
                timing,
                Box::new(move || factory(Arc::clone(&context), index)),
            ));
        }

        let context = Arc::clone(&self.context);
        workers.push(Worker::new(
            WorkerRole::TextInjector.as_str(),
            WorkerRole::TextInjector,
            timing,
            Box::new(move || boxed_task(InjectionWorker::new(Arc::clone(&context)))),
        ));

        if self.config.enable_health_monitoring {
            let context = Arc::clone(&self.context);
            let registry = Arc::downgrade(&self.workers);
            let running = Arc::clone(&self.running);
            workers.push(Worker::new(
                WorkerRole::HealthMonitor.as_str(),
                WorkerRole::HealthMonitor,
                timing,
                Box::new(move || {
                    boxed_task(HealthMonitor::new(
                        WorkerRole::HealthMonitor.as_str(),
                        Arc::clone(&context),
                        registry.clone(),
                        Arc::clone(&running),
                    ))
                }),
            ));
        }

        let context = Arc::clone(&self.context);
        let path = self.config.config_path.clone();
        let poll_interval = self.config.config_poll_interval;
        workers.push(Worker::new(
            WorkerRole::ConfigWatcher.as_str(),
            WorkerRole::ConfigWatcher,
            timing,
            Box::new(move || boxed_task(ConfigWatcher::new(Arc::clone(&context), path.clone(), poll_interval))),
        ));

        workers
    }

    /// Request a stop on every worker without waiting
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
        for worker in self.workers.lock().iter() {
            worker.stop();
        }
    }

    /// Stop and join every worker, then shut down external services
    ///
    /// Idempotent. Each join is bounded by the configured join timeout;
    /// workers that overrun are detached. Waits for an `initialize()` in
    /// progress on another thread.
    pub fn shutdown(&self) {
        let _lifecycle = self.lifecycle.lock();
        self.shutdown_locked();
    }

    fn shutdown_locked(&self) {
        self.running.store(false, Ordering::Release);

        // Drained under the lock, joined outside it: the health monitor
        // takes the same lock
        let workers: Vec<Worker> = {
            let mut guard = self.workers.lock();
            for worker in guard.iter() {
                worker.stop();
            }
            guard.drain(..).collect()
        };
        let services = self.services_initialized.swap(false, Ordering::AcqRel);
        if workers.is_empty() && !services {
            return;
        }

        info!("[POOL] Shutting down {} workers", workers.len());
        let join_timeout = self.config.timing.join_timeout;
        let mut detached = 0;
        for mut worker in workers {
            if worker.join_timeout(join_timeout) == JoinOutcome::Detached {
                detached += 1;
            }
        }

        if services {
            self.context.lookup.shutdown();
            match self.context.injector.try_lock_for(join_timeout) {
                Some(mut injector) => injector.shutdown(),
                None => warn!("[POOL] Text injector still busy; skipping its shutdown"),
            }
        }

        if detached > 0 {
            warn!("[POOL] Shutdown complete, {} worker(s) detached", detached);
        } else {
            info!("[POOL] Shutdown complete");
        }
    }

    pub fn get_stats(&self) -> SystemStats {
        let (total_threads, active_threads, total_events_processed, processing_time) = {
            let workers = self.workers.lock();
            let processors = workers.iter().filter(|w| w.role() == WorkerRole::EventProcessor);
            let (events, time) = processors.fold((0u64, Duration::ZERO), |(events, time), w| {
                (events + w.tasks_processed(), time + w.total_processing_time())
            });
            (
                workers.len(),
                workers.iter().filter(|w| w.is_running()).count(),
                events,
                time,
            )
        };

        let uptime_seconds = self
            .started_at
            .lock()
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let total_expansions_performed = self.context.metrics.expansions_performed();
        let per_second = |count: u64| {
            if uptime_seconds > 0.0 {
                count as f64 / uptime_seconds
            } else {
                0.0
            }
        };

        SystemStats {
            total_threads,
            active_threads,
            total_events_processed,
            total_expansions_performed,
            events_per_second: per_second(total_events_processed),
            expansions_per_second: per_second(total_expansions_performed),
            average_processing_time: if total_events_processed == 0 {
                Duration::ZERO
            } else {
                Duration::from_nanos((processing_time.as_nanos() / u128::from(total_events_processed)) as u64)
            },
            uptime_seconds,
            queue: self.context.queue.get_stats(),
            pipeline: self.context.metrics.snapshot(),
        }
    }

    pub fn worker_snapshots(&self) -> Vec<WorkerSnapshot> {
        self.workers.lock().iter().map(Worker::snapshot).collect()
    }

    /// Stop (if needed) and restart the named worker in place
    ///
    /// # Errors
    ///
    /// `WorkerNotFound` for an unknown name, `InvalidState` if the worker
    /// will not stop in time, otherwise the worker's start error
    pub fn restart_worker(&self, name: &str) -> PoolResult<()> {
        let mut workers = self.workers.lock();
        let worker = workers
            .iter_mut()
            .find(|w| w.name() == name)
            .ok_or_else(|| PoolError::WorkerNotFound(name.to_string()))?;

        if !worker.state().is_terminal() {
            worker.stop();
            if worker.join_timeout(self.config.timing.join_timeout) == JoinOutcome::Detached {
                return Err(PoolError::InvalidState(format!(
                    "worker {} did not stop for restart",
                    name
                )));
            }
        }
        worker.restart()?;
        Ok(())
    }

    /// Zero queue, pipeline and worker throughput counters
    pub fn reset_performance_counters(&self) {
        self.context.queue.reset_stats();
        self.context.metrics.reset();
        for worker in self.workers.lock().iter() {
            worker.reset_counters();
        }
        if self.is_running() {
            *self.started_at.lock() = Some(Instant::now());
        }
        info!("[POOL] Performance counters reset");
    }

    pub fn last_health_report(&self) -> Option<HealthReport> {
        self.context.last_health_report.read().clone()
    }

    /// Thresholds currently in effect (after any config reload)
    pub fn health_thresholds(&self) -> HealthThresholds {
        *self.context.thresholds.read()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
