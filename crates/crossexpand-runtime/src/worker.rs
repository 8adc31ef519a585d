// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Managed worker threads
//!
//! A [`Worker`] owns one OS thread running a cooperative loop over a
//! [`WorkerTask`]. The task is rebuilt from the worker's factory on every
//! start, so a failed worker can be restarted in place.
//!
//! ```text
//! Created ──start──▶ Starting ──▶ Running ──stop──▶ StopRequested ──▶ Stopped
//!                                    │
//!                                    └── fatal error / panic ──▶ Failed
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{TaskError, WorkerError, WorkerResult};

/// Result of one unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Work was done; counted and timed
    Worked,
    /// Nothing to do; the loop sleeps one idle quantum
    Idle,
}

/// One role's unit of work, driven by the worker's run-loop
pub trait WorkerTask: Send {
    fn run_once(&mut self) -> Result<WorkOutcome, TaskError>;

    /// Called on the worker thread after the loop exits
    fn on_stop(&mut self) {}
}

/// Builds a fresh task for every (re)start
pub type TaskFactory = Box<dyn Fn() -> Result<Box<dyn WorkerTask>, TaskError> + Send + Sync>;

/// Box a task for return from a factory
pub fn boxed_task<T: WorkerTask + 'static>(task: T) -> Result<Box<dyn WorkerTask>, TaskError> {
    Ok(Box::new(task))
}

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum WorkerState {
    Created = 0,
    Starting = 1,
    Running = 2,
    StopRequested = 3,
    Stopped = 4,
    Failed = 5,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Created,
            1 => WorkerState::Starting,
            2 => WorkerState::Running,
            3 => WorkerState::StopRequested,
            4 => WorkerState::Stopped,
            _ => WorkerState::Failed,
        }
    }

    /// Stopped or failed; the thread has left its run-loop
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Stopped | WorkerState::Failed)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkerState::Created => "created",
            WorkerState::Starting => "starting",
            WorkerState::Running => "running",
            WorkerState::StopRequested => "stop requested",
            WorkerState::Stopped => "stopped",
            WorkerState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Role of a worker within the pool topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerRole {
    InputMonitor,
    EventProcessor,
    TextInjector,
    HealthMonitor,
    ConfigWatcher,
}

impl WorkerRole {
    pub fn as_str(self) -> &'static str {
        match self {
            WorkerRole::InputMonitor => "input-monitor",
            WorkerRole::EventProcessor => "event-processor",
            WorkerRole::TextInjector => "text-injector",
            WorkerRole::HealthMonitor => "health-monitor",
            WorkerRole::ConfigWatcher => "config-watcher",
        }
    }
}

impl fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Run-loop timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTiming {
    /// Sleep after an idle iteration
    pub idle_sleep: Duration,
    /// How long `start()` waits for the thread to report `Running`
    pub start_timeout: Duration,
    /// Bound used by the pool when joining at shutdown
    pub join_timeout: Duration,
}

impl Default for WorkerTiming {
    fn default() -> Self {
        Self {
            idle_sleep: Duration::from_millis(10),
            start_timeout: Duration::from_millis(100),
            join_timeout: Duration::from_secs(2),
        }
    }
}

/// How a bounded join ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Thread finished and was reclaimed
    Joined,
    /// Thread did not finish in time and was left running
    Detached,
    /// No thread to join
    NotStarted,
}

/// Read-only view of a worker
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSnapshot {
    pub role: WorkerRole,
    pub name: String,
    pub state: WorkerState,
    pub running: bool,
    pub stop_requested: bool,
    pub detached: bool,
    pub tasks_processed: u64,
    pub total_processing_time: Duration,
    pub average_processing_time: Duration,
    /// Time since the current run started (zero if never started)
    pub uptime: Duration,
    pub restarts: u32,
    pub errors: u64,
}

/// State shared between a worker and its thread
struct WorkerShared {
    state: AtomicU8,
    stop_requested: AtomicBool,
    detached: AtomicBool,
    tasks_processed: AtomicU64,
    processing_nanos: AtomicU64,
    errors: AtomicU64,
    restarts: AtomicU32,
    start_time: Mutex<Option<Instant>>,
}

impl WorkerShared {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Created as u8),
            stop_requested: AtomicBool::new(false),
            detached: AtomicBool::new(false),
            tasks_processed: AtomicU64::new(0),
            processing_nanos: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            restarts: AtomicU32::new(0),
            start_time: Mutex::new(None),
        }
    }

    fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn transition(&self, from: WorkerState, to: WorkerState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

/// Marks the worker `Failed` if its thread unwinds
struct PanicGuard<'a> {
    shared: &'a WorkerShared,
    name: &'a str,
}

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.shared.errors.fetch_add(1, Ordering::Relaxed);
            self.shared.set_state(WorkerState::Failed);
            error!("[WORKER:{}] Run-loop panicked", self.name);
        }
    }
}

/// A supervised, restartable worker thread
pub struct Worker {
    name: String,
    role: WorkerRole,
    timing: WorkerTiming,
    factory: TaskFactory,
    shared: Arc<WorkerShared>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    pub fn new(name: impl Into<String>, role: WorkerRole, timing: WorkerTiming, factory: TaskFactory) -> Self {
        Self {
            name: name.into(),
            role,
            timing,
            factory,
            shared: Arc::new(WorkerShared::new()),
            handle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> WorkerRole {
        self.role
    }

    pub fn state(&self) -> WorkerState {
        self.shared.state()
    }

    /// True while a live, attached thread is inside its run-loop
    pub fn is_running(&self) -> bool {
        matches!(
            self.state(),
            WorkerState::Starting | WorkerState::Running | WorkerState::StopRequested
        ) && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    pub fn restarts(&self) -> u32 {
        self.shared.restarts.load(Ordering::Relaxed)
    }

    /// Build the task, spawn the thread and wait for it to report `Running`
    ///
    /// # Errors
    ///
    /// - `AlreadyRunning` if the thread is still alive
    /// - `InitializationFailure` if the factory fails
    /// - `SpawnFailed`, `StartTimeout` or `StartFailed` if the thread does not come up
    pub fn start(&mut self) -> WorkerResult<()> {
        if self.is_running() {
            return Err(WorkerError::AlreadyRunning {
                name: self.name.clone(),
            });
        }
        self.reap_finished()?;

        let task = (self.factory)().map_err(|e| WorkerError::InitializationFailure {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;

        self.shared.stop_requested.store(false, Ordering::Release);
        self.shared.detached.store(false, Ordering::Release);
        self.shared.set_state(WorkerState::Starting);
        *self.shared.start_time.lock() = Some(Instant::now());

        let shared = Arc::clone(&self.shared);
        let name = self.name.clone();
        let idle_sleep = self.timing.idle_sleep;

        let handle = thread::Builder::new()
            .name(format!("crossexpand-{}", self.name))
            .spawn(move || run_loop(&name, task, &shared, idle_sleep))
            .map_err(|source| {
                self.shared.set_state(WorkerState::Failed);
                WorkerError::SpawnFailed {
                    name: self.name.clone(),
                    source,
                }
            })?;
        self.handle = Some(handle);

        self.wait_until_started()
    }

    fn wait_until_started(&self) -> WorkerResult<()> {
        let deadline = Instant::now() + self.timing.start_timeout;
        loop {
            match self.state() {
                WorkerState::Running | WorkerState::StopRequested | WorkerState::Stopped => {
                    debug!("[WORKER:{}] Started", self.name);
                    return Ok(());
                }
                WorkerState::Failed => {
                    return Err(WorkerError::StartFailed {
                        name: self.name.clone(),
                    });
                }
                WorkerState::Created | WorkerState::Starting => {}
            }

            if Instant::now() >= deadline {
                // Let the thread exit on its own once it gets scheduled
                self.shared.stop_requested.store(true, Ordering::Release);
                return Err(WorkerError::StartTimeout {
                    name: self.name.clone(),
                    timeout: self.timing.start_timeout,
                });
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Request a cooperative stop; in-flight work is not interrupted
    pub fn stop(&self) {
        self.shared.stop_requested.store(true, Ordering::Release);
        if self.shared.transition(WorkerState::Running, WorkerState::StopRequested) {
            debug!("[WORKER:{}] Stop requested", self.name);
        }
    }

    /// Block until the thread exits
    ///
    /// # Errors
    ///
    /// `Panicked` if the run-loop unwound
    pub fn join(&mut self) -> WorkerResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        handle.join().map_err(|_| WorkerError::Panicked {
            name: self.name.clone(),
        })
    }

    /// Join with an upper bound, detaching the thread if it overruns
    pub fn join_timeout(&mut self, limit: Duration) -> JoinOutcome {
        if self.handle.is_none() {
            return JoinOutcome::NotStarted;
        }

        let deadline = Instant::now() + limit;
        while self.handle.as_ref().is_some_and(|h| !h.is_finished()) {
            if Instant::now() >= deadline {
                self.handle = None;
                self.shared.detached.store(true, Ordering::Release);
                error!(
                    "[WORKER:{}] Did not stop within {:?}; detaching thread",
                    self.name, limit
                );
                return JoinOutcome::Detached;
            }
            thread::sleep(Duration::from_millis(1));
        }

        if let Err(e) = self.join() {
            warn!("{}", e);
        }
        JoinOutcome::Joined
    }

    /// Restart a stopped or failed worker with a freshly built task
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the worker is `Stopped` or `Failed`, otherwise
    /// any error from [`Worker::start`]
    pub fn restart(&mut self) -> WorkerResult<()> {
        let state = self.state();
        if !state.is_terminal() {
            return Err(WorkerError::InvalidState {
                name: self.name.clone(),
                operation: "restart",
                state,
            });
        }

        // The loop has exited, so this join only waits for thread teardown
        if let Err(e) = self.join() {
            debug!("Reaped before restart: {}", e);
        }

        let attempt = self.shared.restarts.fetch_add(1, Ordering::Relaxed) + 1;
        info!("[WORKER:{}] Restarting (attempt {})", self.name, attempt);
        self.start()
    }

    fn reap_finished(&mut self) -> WorkerResult<()> {
        match self.handle.as_ref() {
            Some(handle) if handle.is_finished() => {
                if let Err(e) = self.join() {
                    debug!("Reaped before start: {}", e);
                }
                Ok(())
            }
            Some(_) => Err(WorkerError::AlreadyRunning {
                name: self.name.clone(),
            }),
            None => Ok(()),
        }
    }

    pub fn tasks_processed(&self) -> u64 {
        self.shared.tasks_processed.load(Ordering::Relaxed)
    }

    pub fn total_processing_time(&self) -> Duration {
        Duration::from_nanos(self.shared.processing_nanos.load(Ordering::Relaxed))
    }

    pub fn average_processing_time(&self) -> Duration {
        let tasks = self.tasks_processed();
        if tasks == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.shared.processing_nanos.load(Ordering::Relaxed) / tasks)
        }
    }

    pub fn uptime(&self) -> Duration {
        self.shared
            .start_time
            .lock()
            .map(|started| started.elapsed())
            .unwrap_or_default()
    }

    pub fn errors(&self) -> u64 {
        self.shared.errors.load(Ordering::Relaxed)
    }

    /// Zero the throughput counters (restarts are kept)
    pub fn reset_counters(&self) {
        self.shared.tasks_processed.store(0, Ordering::Relaxed);
        self.shared.processing_nanos.store(0, Ordering::Relaxed);
        self.shared.errors.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        WorkerSnapshot {
            role: self.role,
            name: self.name.clone(),
            state: self.state(),
            running: self.is_running(),
            stop_requested: self.shared.stop_requested.load(Ordering::Acquire),
            detached: self.shared.detached.load(Ordering::Acquire),
            tasks_processed: self.tasks_processed(),
            total_processing_time: self.total_processing_time(),
            average_processing_time: self.average_processing_time(),
            uptime: self.uptime(),
            restarts: self.restarts(),
            errors: self.errors(),
        }
    }
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("state", &self.state())
            .finish()
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
            self.join_timeout(self.timing.join_timeout);
        }
    }
}

fn run_loop(name: &str, mut task: Box<dyn WorkerTask>, shared: &WorkerShared, idle_sleep: Duration) {
    let _guard = PanicGuard { shared, name };
    shared.transition(WorkerState::Starting, WorkerState::Running);
    debug!("[WORKER:{}] Run-loop entered", name);

    while !shared.stop_requested.load(Ordering::Acquire) {
        let started = Instant::now();
        match task.run_once() {
            Ok(WorkOutcome::Worked) => {
                let elapsed = started.elapsed().as_nanos() as u64;
                shared.tasks_processed.fetch_add(1, Ordering::Relaxed);
                shared.processing_nanos.fetch_add(elapsed, Ordering::Relaxed);
            }
            Ok(WorkOutcome::Idle) => thread::sleep(idle_sleep),
            Err(TaskError::Recoverable(reason)) => {
                shared.errors.fetch_add(1, Ordering::Relaxed);
                warn!("[WORKER:{}] {}", name, reason);
            }
            Err(TaskError::Fatal(reason)) => {
                shared.errors.fetch_add(1, Ordering::Relaxed);
                error!("[WORKER:{}] Fatal error, leaving run-loop: {}", name, reason);
                task.on_stop();
                shared.set_state(WorkerState::Failed);
                return;
            }
        }
    }

    task.on_stop();
    shared.set_state(WorkerState::Stopped);
    debug!("[WORKER:{}] Run-loop exited", name);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        hits: Arc<AtomicUsize>,
    }

    impl WorkerTask for Counting {
        fn run_once(&mut self) -> Result<WorkOutcome, TaskError> {
            self.hits.fetch_add(1, Ordering::Relaxed);
            Ok(WorkOutcome::Worked)
        }
    }

    struct Scripted {
        script: Vec<Result<WorkOutcome, TaskError>>,
    }

    impl WorkerTask for Scripted {
        fn run_once(&mut self) -> Result<WorkOutcome, TaskError> {
            self.script.pop().unwrap_or(Ok(WorkOutcome::Idle))
        }
    }

    struct Panicking;

    impl WorkerTask for Panicking {
        fn run_once(&mut self) -> Result<WorkOutcome, TaskError> {
            panic!("boom");
        }
    }

    fn counting_worker(hits: Arc<AtomicUsize>) -> Worker {
        Worker::new(
            "counter",
            WorkerRole::EventProcessor,
            WorkerTiming::default(),
            Box::new(move || boxed_task(Counting { hits: Arc::clone(&hits) })),
        )
    }

    fn wait_for_state(worker: &Worker, state: WorkerState) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while worker.state() != state && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_lifecycle_start_stop_join() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut worker = counting_worker(Arc::clone(&hits));
        assert_eq!(worker.state(), WorkerState::Created);
        assert!(!worker.is_running());

        worker.start().unwrap();
        assert!(worker.is_running());

        thread::sleep(Duration::from_millis(20));
        worker.stop();
        worker.join().unwrap();

        assert!(!worker.is_running());
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert!(worker.tasks_processed() > 0);
        assert_eq!(worker.tasks_processed() as usize, hits.load(Ordering::Relaxed));
    }

    #[test]
    fn test_idle_worker_stops_within_one_idle_sleep() {
        let timing = WorkerTiming {
            idle_sleep: Duration::from_millis(100),
            ..WorkerTiming::default()
        };
        let mut worker = Worker::new(
            "idler",
            WorkerRole::EventProcessor,
            timing,
            Box::new(|| boxed_task(Scripted { script: Vec::new() })),
        );
        worker.start().unwrap();
        // Let the loop settle into its idle sleep
        thread::sleep(Duration::from_millis(30));

        let started = Instant::now();
        worker.stop();
        worker.join().unwrap();
        let elapsed = started.elapsed();

        assert!(
            elapsed < timing.idle_sleep + Duration::from_millis(150),
            "stop took {:?}",
            elapsed
        );
        assert!(!worker.is_running());
        assert_eq!(worker.state(), WorkerState::Stopped);
        assert_eq!(worker.tasks_processed(), 0);
    }

    #[test]
    fn test_start_twice_is_an_error() {
        let mut worker = counting_worker(Arc::new(AtomicUsize::new(0)));
        worker.start().unwrap();
        assert!(matches!(worker.start(), Err(WorkerError::AlreadyRunning { .. })));
        worker.stop();
        worker.join().unwrap();
    }

    #[test]
    fn test_factory_failure_is_initialization_failure() {
        let mut worker = Worker::new(
            "broken",
            WorkerRole::EventProcessor,
            WorkerTiming::default(),
            Box::new(|| -> Result<Box<dyn WorkerTask>, TaskError> { Err(TaskError::Fatal("no backend".to_string())) }),
        );
        let err = worker.start().unwrap_err();
        assert!(matches!(err, WorkerError::InitializationFailure { .. }));
        assert!(err.to_string().contains("no backend"));
        assert_eq!(worker.state(), WorkerState::Created);
    }

    #[test]
    fn test_recoverable_error_keeps_loop_alive() {
        let mut worker = Worker::new(
            "flaky",
            WorkerRole::EventProcessor,
            WorkerTiming::default(),
            Box::new(|| {
                boxed_task(Scripted {
                    script: vec![
                        Ok(WorkOutcome::Worked),
                        Err(TaskError::Recoverable("transient".to_string())),
                    ],
                })
            }),
        );
        worker.start().unwrap();
        thread::sleep(Duration::from_millis(30));
        assert!(worker.is_running());
        assert_eq!(worker.errors(), 1);
        assert_eq!(worker.tasks_processed(), 1);

        worker.stop();
        worker.join().unwrap();
        assert_eq!(worker.state(), WorkerState::Stopped);
    }

    #[test]
    fn test_fatal_error_fails_worker_and_restart_recovers() {
        let mut worker = Worker::new(
            "fragile",
            WorkerRole::EventProcessor,
            WorkerTiming::default(),
            Box::new(|| {
                boxed_task(Scripted {
                    script: vec![Err(TaskError::Fatal("lost device".to_string())), Ok(WorkOutcome::Idle)],
                })
            }),
        );
        worker.start().unwrap();
        wait_for_state(&worker, WorkerState::Failed);
        assert_eq!(worker.state(), WorkerState::Failed);
        assert!(!worker.is_running());

        worker.restart().unwrap();
        assert_eq!(worker.restarts(), 1);
        wait_for_state(&worker, WorkerState::Failed);
        assert_eq!(worker.state(), WorkerState::Failed);
        worker.join().unwrap();
    }

    #[test]
    fn test_restart_rejected_while_running() {
        let mut worker = counting_worker(Arc::new(AtomicUsize::new(0)));
        worker.start().unwrap();
        assert!(matches!(worker.restart(), Err(WorkerError::InvalidState { .. })));
        worker.stop();
        worker.join().unwrap();
    }

    #[test]
    fn test_panic_marks_failed() {
        let mut worker = Worker::new(
            "panicky",
            WorkerRole::EventProcessor,
            WorkerTiming::default(),
            Box::new(|| boxed_task(Panicking)),
        );
        // The panic may land before or after start() observes Running
        let _ = worker.start();
        wait_for_state(&worker, WorkerState::Failed);
        assert_eq!(worker.state(), WorkerState::Failed);
        assert!(matches!(worker.join(), Err(WorkerError::Panicked { .. })));
    }

    #[test]
    fn test_join_timeout_detaches_stuck_worker() {
        struct Stuck;
        impl WorkerTask for Stuck {
            fn run_once(&mut self) -> Result<WorkOutcome, TaskError> {
                thread::sleep(Duration::from_millis(300));
                Ok(WorkOutcome::Worked)
            }
        }

        let mut worker = Worker::new(
            "stuck",
            WorkerRole::EventProcessor,
            WorkerTiming::default(),
            Box::new(|| boxed_task(Stuck)),
        );
        worker.start().unwrap();
        worker.stop();

        assert_eq!(worker.join_timeout(Duration::from_millis(20)), JoinOutcome::Detached);
        assert!(worker.snapshot().detached);
        assert!(!worker.is_running());
        assert_eq!(worker.join_timeout(Duration::from_millis(20)), JoinOutcome::NotStarted);
    }

    #[test]
    fn test_snapshot_reports_counters() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut worker = counting_worker(hits);
        worker.start().unwrap();
        thread::sleep(Duration::from_millis(10));
        worker.stop();
        worker.join().unwrap();

        let snapshot = worker.snapshot();
        assert_eq!(snapshot.name, "counter");
        assert_eq!(snapshot.role, WorkerRole::EventProcessor);
        assert_eq!(snapshot.state, WorkerState::Stopped);
        assert!(snapshot.stop_requested);
        assert!(snapshot.tasks_processed > 0);

        worker.reset_counters();
        assert_eq!(worker.tasks_processed(), 0);
    }
}
