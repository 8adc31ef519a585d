// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pool startup, shutdown, supervision and multi-consumer behavior

mod common;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{services, test_config, wait_until, RecordingInjector, ScriptedHook};
use crossexpand_event_queue::{KeyPayload, Priority};
use crossexpand_runtime::roles::EventProcessor;
use crossexpand_runtime::{
    boxed_task, DependencyContext, PoolError, TaskError, Verdict, WorkOutcome, WorkerError, WorkerPool, WorkerRole,
    WorkerState, WorkerTask,
};
use parking_lot::Mutex;

fn empty_pool(processors: usize) -> WorkerPool {
    WorkerPool::new(
        test_config(processors),
        services(ScriptedHook::default(), Default::default(), RecordingInjector::default()),
    )
    .unwrap()
}

fn processor(pool: &WorkerPool, name: &str) -> crossexpand_runtime::WorkerSnapshot {
    pool.worker_snapshots()
        .into_iter()
        .find(|s| s.name == name)
        .unwrap()
}

#[test]
fn failing_processor_start_leaves_no_threads() {
    let mut pool = empty_pool(4);
    pool.set_processor_factory(Arc::new(|context: Arc<DependencyContext>, index: usize| {
        if index == 2 {
            Err(TaskError::Fatal("processor 2 cannot start".to_string()))
        } else {
            boxed_task(EventProcessor::new(context))
        }
    }))
    .unwrap();

    let err = pool.initialize().unwrap_err();
    assert!(matches!(
        err,
        PoolError::Worker(WorkerError::InitializationFailure { ref name, .. }) if name == "event-processor-2"
    ));

    pool.shutdown();
    let stats = pool.get_stats();
    assert_eq!(stats.active_threads, 0);
    assert!(!pool.is_running());
}

#[test]
fn stop_then_join_is_prompt() {
    let pool = empty_pool(2);
    pool.initialize().unwrap();
    assert!(pool.is_running());

    let started = Instant::now();
    pool.shutdown();
    // Idle workers notice the stop within one idle quantum
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(pool.get_stats().active_threads, 0);
}

#[test]
fn stop_requests_without_joining() {
    let pool = empty_pool(1);
    pool.initialize().unwrap();
    pool.stop();
    assert!(!pool.is_running());

    assert!(wait_until(Duration::from_secs(2), || {
        pool.worker_snapshots()
            .iter()
            .all(|s| s.state == WorkerState::Stopped)
    }));
    pool.shutdown();
}

/// Records every sequence id it pops
struct RecordingProcessor {
    context: Arc<DependencyContext>,
    seen: Arc<Mutex<Vec<u64>>>,
}

impl WorkerTask for RecordingProcessor {
    fn run_once(&mut self) -> Result<WorkOutcome, TaskError> {
        match self.context.queue.pop() {
            Some(event) => {
                self.seen.lock().push(event.sequence_id);
                Ok(WorkOutcome::Worked)
            }
            None => Ok(WorkOutcome::Idle),
        }
    }
}

#[test]
fn four_processors_drain_each_event_exactly_once() {
    const TOTAL: u64 = 100_000;

    let seen = Arc::new(Mutex::new(Vec::with_capacity(TOTAL as usize)));
    let mut pool = empty_pool(4);
    let sink = Arc::clone(&seen);
    pool.set_processor_factory(Arc::new(move |context: Arc<DependencyContext>, _index: usize| {
        boxed_task(RecordingProcessor {
            context,
            seen: Arc::clone(&sink),
        })
    }))
    .unwrap();
    pool.initialize().unwrap();

    let queue = pool.queue();
    let mut accepted = 0;
    while accepted < TOTAL {
        if queue.push_key(KeyPayload::press(65, 'a'), Priority::Normal).is_ok() {
            accepted += 1;
        } else {
            std::thread::yield_now();
        }
    }

    assert!(wait_until(Duration::from_secs(30), || {
        pool.get_stats().total_events_processed == TOTAL
    }));
    pool.shutdown();

    let seen = seen.lock();
    assert_eq!(seen.len() as u64, TOTAL);
    let unique: HashSet<u64> = seen.iter().copied().collect();
    assert_eq!(unique.len() as u64, TOTAL);
    assert_eq!(queue.get_stats().total_popped, TOTAL);
}

/// Idles a few iterations, then fails; counts how often it was built
struct FailsAfterWarmup {
    remaining_idle: usize,
}

impl WorkerTask for FailsAfterWarmup {
    fn run_once(&mut self) -> Result<WorkOutcome, TaskError> {
        if self.remaining_idle == 0 {
            return Err(TaskError::Fatal("device lost".to_string()));
        }
        self.remaining_idle -= 1;
        Ok(WorkOutcome::Idle)
    }
}

#[test]
fn health_monitor_restarts_failed_worker_once_recovered() {
    let builds = Arc::new(AtomicUsize::new(0));
    let mut pool = empty_pool(1);
    let counter = Arc::clone(&builds);
    pool.set_processor_factory(Arc::new(move |context: Arc<DependencyContext>, _index: usize| {
        // First build fails after warming up, later builds are healthy
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            boxed_task(FailsAfterWarmup { remaining_idle: 5 })
        } else {
            boxed_task(EventProcessor::new(context))
        }
    }))
    .unwrap();
    pool.initialize().unwrap();

    assert!(wait_until(Duration::from_secs(5), || {
        let snapshot = processor(&pool, "event-processor-0");
        snapshot.restarts == 1 && snapshot.state == WorkerState::Running
    }));
    assert_eq!(builds.load(Ordering::SeqCst), 2);

    assert!(wait_until(Duration::from_secs(5), || {
        pool.last_health_report()
            .is_some_and(|r| r.verdict == Verdict::Healthy)
    }));
    pool.shutdown();
}

#[test]
fn restart_attempts_are_bounded() {
    let mut pool = empty_pool(1);
    pool.set_processor_factory(Arc::new(|_context: Arc<DependencyContext>, _index: usize| {
        boxed_task(FailsAfterWarmup { remaining_idle: 3 })
    }))
    .unwrap();
    pool.initialize().unwrap();

    let max_attempts = pool.health_thresholds().max_restart_attempts;
    assert!(wait_until(Duration::from_secs(5), || {
        let snapshot = processor(&pool, "event-processor-0");
        snapshot.restarts == max_attempts && snapshot.state == WorkerState::Failed
    }));

    // Several more check intervals: the budget stays spent
    std::thread::sleep(Duration::from_millis(200));
    let snapshot = processor(&pool, "event-processor-0");
    assert_eq!(snapshot.restarts, max_attempts);
    assert_eq!(snapshot.state, WorkerState::Failed);

    let report = pool.last_health_report().unwrap();
    assert_eq!(report.verdict, Verdict::Unhealthy);
    assert_eq!(report.failed_workers, vec!["event-processor-0".to_string()]);
    pool.shutdown();
}

#[test]
fn reset_performance_counters_zeroes_stats() {
    let pool = empty_pool(1);
    pool.initialize().unwrap();

    let queue = pool.queue();
    for _ in 0..10 {
        queue.push_key(KeyPayload::press(66, 'b'), Priority::High).unwrap();
    }
    assert!(wait_until(Duration::from_secs(2), || {
        pool.get_stats().total_events_processed == 10
    }));

    pool.reset_performance_counters();
    let stats = pool.get_stats();
    assert_eq!(stats.total_events_processed, 0);
    assert_eq!(stats.queue.total_pushed, 0);
    assert_eq!(stats.queue.total_popped, 0);
    assert_eq!(stats.pipeline.lookups, 0);
    pool.shutdown();
}

#[test]
fn stats_serialize_for_reporting() {
    let pool = empty_pool(1);
    pool.initialize().unwrap();

    let json = serde_json::to_value(pool.get_stats()).unwrap();
    assert_eq!(json["total_threads"], 5);
    assert!(json["queue"]["drops_by_priority"].is_array());

    let snapshots = serde_json::to_value(pool.worker_snapshots()).unwrap();
    assert_eq!(snapshots[0]["role"], "input-monitor");
    assert!(pool
        .worker_snapshots()
        .iter()
        .any(|s| s.role == WorkerRole::ConfigWatcher));
    pool.shutdown();
}

/// Pool whose processor 1 takes `delay` to build, flagging `entered` first
fn slow_starting_pool(delay: Duration, entered: Arc<AtomicBool>) -> WorkerPool {
    let mut pool = empty_pool(3);
    pool.set_processor_factory(Arc::new(move |context: Arc<DependencyContext>, index: usize| {
        if index == 1 {
            entered.store(true, Ordering::Release);
            std::thread::sleep(delay);
        }
        boxed_task(EventProcessor::new(context))
    }))
    .unwrap();
    pool
}

#[test]
fn shutdown_during_initialize_leaves_no_threads() {
    let entered = Arc::new(AtomicBool::new(false));
    let pool = slow_starting_pool(Duration::from_millis(200), Arc::clone(&entered));

    std::thread::scope(|scope| {
        let init = scope.spawn(|| pool.initialize());
        assert!(wait_until(Duration::from_secs(2), || entered.load(Ordering::Acquire)));
        std::thread::sleep(Duration::from_millis(80));

        pool.shutdown();
        assert!(init.join().unwrap().is_ok());
    });

    let stats = pool.get_stats();
    assert_eq!(stats.active_threads, 0);
    assert_eq!(stats.total_threads, 0);
    assert!(!pool.is_running());
}

#[test]
fn stop_during_initialize_aborts_startup() {
    let entered = Arc::new(AtomicBool::new(false));
    let pool = slow_starting_pool(Duration::from_millis(200), Arc::clone(&entered));

    std::thread::scope(|scope| {
        let init = scope.spawn(|| pool.initialize());
        assert!(wait_until(Duration::from_secs(2), || entered.load(Ordering::Acquire)));

        pool.stop();
        let result = init.join().unwrap();
        assert!(matches!(result, Err(PoolError::InvalidState(_))));
    });

    let stats = pool.get_stats();
    assert_eq!(stats.active_threads, 0);
    assert_eq!(stats.total_threads, 0);
    assert!(!pool.is_running());
}
