// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared dependencies handed to every worker

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use crossexpand_event_queue::EventQueue;
use parking_lot::{Mutex, RwLock};

use crate::health::{HealthReport, HealthThresholds};
use crate::metrics::PipelineMetrics;
use crate::sequence::{SequenceSettings, SequenceTracker};
use crate::services::{InputHook, PriorityClassifier, ShortcutLookup, TextInjector};

/// An expansion waiting for the text-injector worker
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionJob {
    pub trigger: String,
    pub text: String,
    pub detected_at: Instant,
}

/// Everything the workers share, built once per pool and passed by `Arc`
pub struct DependencyContext {
    pub queue: Arc<EventQueue>,
    pub lookup: Arc<dyn ShortcutLookup>,
    pub injector: Mutex<Box<dyn TextInjector>>,
    pub input_hook: Mutex<Box<dyn InputHook>>,
    pub classifier: Arc<dyn PriorityClassifier>,
    pub metrics: PipelineMetrics,
    /// Republished by the config watcher
    pub thresholds: RwLock<HealthThresholds>,
    /// Locked across pop + feed so keystrokes are seen in queue order
    pub sequence: Mutex<SequenceTracker>,
    pub last_health_report: RwLock<Option<HealthReport>>,
    /// Pause between erasing the trigger and typing the expansion
    pub expansion_delay: Duration,
    injection_tx: Sender<InjectionJob>,
    injection_rx: Receiver<InjectionJob>,
}

/// Constructor arguments for [`DependencyContext`]
pub struct ContextParts {
    pub queue: Arc<EventQueue>,
    pub lookup: Arc<dyn ShortcutLookup>,
    pub injector: Box<dyn TextInjector>,
    pub input_hook: Box<dyn InputHook>,
    pub classifier: Arc<dyn PriorityClassifier>,
    pub thresholds: HealthThresholds,
    pub sequence: SequenceSettings,
    pub expansion_delay: Duration,
    pub pending_injections: usize,
}

impl DependencyContext {
    pub fn new(parts: ContextParts) -> Self {
        let (injection_tx, injection_rx) = channel::bounded(parts.pending_injections.max(1));
        Self {
            queue: parts.queue,
            lookup: parts.lookup,
            injector: Mutex::new(parts.injector),
            input_hook: Mutex::new(parts.input_hook),
            classifier: parts.classifier,
            metrics: PipelineMetrics::new(),
            thresholds: RwLock::new(parts.thresholds),
            sequence: Mutex::new(SequenceTracker::new(parts.sequence)),
            last_health_report: RwLock::new(None),
            expansion_delay: parts.expansion_delay,
            injection_tx,
            injection_rx,
        }
    }

    /// Queue an expansion for injection, handing it back if the backlog is full
    pub fn submit_injection(&self, job: InjectionJob) -> Result<(), InjectionJob> {
        self.injection_tx.try_send(job).map_err(|e| match e {
            TrySendError::Full(job) | TrySendError::Disconnected(job) => job,
        })
    }

    pub fn next_injection(&self) -> Option<InjectionJob> {
        self.injection_rx.try_recv().ok()
    }

    pub fn pending_injections(&self) -> usize {
        self.injection_rx.len()
    }
}
