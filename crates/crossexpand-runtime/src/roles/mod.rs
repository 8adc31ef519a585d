// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Worker tasks for each role in the pool topology

pub mod config_watcher;
pub mod event_processor;
pub mod input_monitor;
pub mod text_injector;

pub use config_watcher::ConfigWatcher;
pub use event_processor::EventProcessor;
pub use input_monitor::InputMonitor;
pub use text_injector::InjectionWorker;
