//! Common test doubles for pool-level tests

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossexpand_event_queue::KeyPayload;
use crossexpand_runtime::{
    HealthThresholds, InputHook, KeySink, MapShortcutLookup, PoolConfig, PoolServices, ServiceResult,
    TextInjector, WorkerTiming,
};
use parking_lot::Mutex;

/// Hook that delivers whatever keys the test queues up
#[derive(Clone, Default)]
pub struct ScriptedHook {
    pending: Arc<Mutex<Vec<KeyPayload>>>,
    sink: Arc<Mutex<Option<KeySink>>>,
    installs: Arc<Mutex<usize>>,
}

impl ScriptedHook {
    /// Queue presses for every character of `text`
    pub fn type_text(&self, text: &str) {
        let mut pending = self.pending.lock();
        for c in text.chars() {
            pending.push(KeyPayload::press(c as u32, c));
            pending.push(KeyPayload::release(c as u32));
        }
    }

    pub fn installs(&self) -> usize {
        *self.installs.lock()
    }

    pub fn is_installed(&self) -> bool {
        self.sink.lock().is_some()
    }
}

impl InputHook for ScriptedHook {
    fn initialize(&mut self) -> ServiceResult<()> {
        Ok(())
    }

    fn install(&mut self, sink: KeySink) -> ServiceResult<()> {
        *self.sink.lock() = Some(sink);
        *self.installs.lock() += 1;
        Ok(())
    }

    fn pump(&mut self) -> ServiceResult<usize> {
        let sink = self.sink.lock().clone();
        let Some(sink) = sink else {
            return Ok(0);
        };
        let batch: Vec<KeyPayload> = self.pending.lock().drain(..).collect();
        Ok(batch.into_iter().filter(|p| sink.submit(p.clone())).count())
    }

    fn uninstall(&mut self) {
        *self.sink.lock() = None;
    }
}

/// What the injector was asked to do, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectorCall {
    Delete(usize),
    Inject(String),
}

#[derive(Clone, Default)]
pub struct RecordingInjector {
    pub calls: Arc<Mutex<Vec<InjectorCall>>>,
    pub shutdowns: Arc<Mutex<usize>>,
}

impl TextInjector for RecordingInjector {
    fn initialize(&mut self) -> ServiceResult<()> {
        Ok(())
    }

    fn inject(&mut self, text: &str) -> bool {
        self.calls.lock().push(InjectorCall::Inject(text.to_string()));
        true
    }

    fn delete_previous_chars(&mut self, count: usize) -> bool {
        self.calls.lock().push(InjectorCall::Delete(count));
        true
    }

    fn last_error(&self) -> Option<String> {
        None
    }

    fn shutdown(&mut self) {
        *self.shutdowns.lock() += 1;
    }
}

pub fn shortcuts(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Small, fast pool configuration for tests
pub fn test_config(processors: usize) -> PoolConfig {
    PoolConfig {
        processor_thread_count: processors,
        queue_slots_per_priority: 4096,
        timing: WorkerTiming {
            idle_sleep: Duration::from_millis(1),
            start_timeout: Duration::from_millis(500),
            join_timeout: Duration::from_secs(2),
        },
        thresholds: HealthThresholds {
            check_interval: Duration::from_millis(20),
            ..HealthThresholds::default()
        },
        expansion_delay: Duration::ZERO,
        config_poll_interval: Duration::from_millis(10),
        ..PoolConfig::default()
    }
}

pub fn services(
    hook: ScriptedHook,
    table: BTreeMap<String, String>,
    injector: RecordingInjector,
) -> PoolServices {
    PoolServices::new(Box::new(hook), Arc::new(MapShortcutLookup::new(table)), Box::new(injector))
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}
