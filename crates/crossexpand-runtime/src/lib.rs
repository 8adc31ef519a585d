// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # CrossExpand Runtime
//!
//! Supervised worker threads around the keystroke [`EventQueue`]:
//!
//! - [`Worker`]: one OS thread with a start/stop/join lifecycle and a
//!   cooperative run-loop over a [`WorkerTask`]
//! - [`WorkerPool`]: builds the fixed topology (input monitor, event
//!   processors, text injector, health monitor, config watcher), shares a
//!   [`DependencyContext`] with every worker and manages collective shutdown
//! - [`HealthMonitor`]: periodic verdict over queue pressure and worker
//!   liveness, with bounded in-place restarts
//!
//! No async runtime is involved; every worker is a plain thread.
//!
//! [`EventQueue`]: crossexpand_event_queue::EventQueue

pub mod context;
pub mod error;
pub mod health;
pub mod metrics;
pub mod pool;
pub mod roles;
pub mod sequence;
pub mod services;
pub mod worker;

pub use context::{ContextParts, DependencyContext, InjectionJob};
pub use error::{PoolError, PoolResult, TaskError, WorkerError, WorkerResult};
pub use health::{HealthMonitor, HealthReport, HealthSample, HealthThresholds, Verdict};
pub use metrics::{PipelineMetrics, PipelineSnapshot};
pub use pool::{PoolConfig, PoolServices, ProcessorFactory, SystemStats, WorkerPool};
pub use sequence::{SequenceSettings, SequenceTracker};
pub use services::{
    DefaultClassifier, ExpansionContext, InputHook, KeySink, MapShortcutLookup, PriorityClassifier,
    ServiceError, ServiceResult, ShortcutLookup, TextInjector,
};
pub use worker::{
    boxed_task, JoinOutcome, TaskFactory, WorkOutcome, Worker, WorkerRole, WorkerSnapshot, WorkerState, WorkerTask,
    WorkerTiming,
};

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
