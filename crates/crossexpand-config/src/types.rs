// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `crossexpand.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CrossExpandConfig {
    pub processing: ProcessingConfig,
    pub queue: QueueConfig,
    pub health: HealthConfig,
    pub workers: WorkersConfig,
    pub injection: InjectionConfig,
    pub input: InputConfig,
    pub logging: LoggingConfig,
    /// Shortcut table (`"/sig" = "Best regards"`), consumed by the daemon's lookup service
    pub shortcuts: BTreeMap<String, String>,
}

/// Worker topology configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Number of event-processor workers (0 = host core count)
    pub processor_thread_count: usize,
    pub enable_health_monitoring: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            processor_thread_count: 0, // 0 = auto-detect
            enable_health_monitoring: true,
        }
    }
}

impl ProcessingConfig {
    /// Processor count with auto-detection resolved
    pub fn effective_processor_thread_count(&self) -> usize {
        if self.processor_thread_count == 0 {
            num_cpus::get().max(1)
        } else {
            self.processor_thread_count
        }
    }
}

/// Event queue sizing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Slots per priority ring; must be a power of two (usable capacity is one less)
    pub queue_capacity_per_priority: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_capacity_per_priority: 4096,
        }
    }
}

/// Health supervision thresholds
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthConfig {
    pub health_check_interval_seconds: u64,
    pub max_queue_utilization: f64,
    pub min_success_rate: f64,
    pub max_response_time_seconds: u64,
    /// Restart attempts allowed per worker over the pool lifetime
    pub max_restart_attempts: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            health_check_interval_seconds: 5,
            max_queue_utilization: 0.8,
            min_success_rate: 0.95,
            max_response_time_seconds: 1,
            max_restart_attempts: 3,
        }
    }
}

impl HealthConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_seconds)
    }

    pub fn max_response_time(&self) -> Duration {
        Duration::from_secs(self.max_response_time_seconds)
    }
}

/// Worker run-loop timing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Sleep when a unit of work finds nothing to do
    pub idle_sleep_ms: u64,
    /// How long `start()` waits for the thread to report running
    pub start_timeout_ms: u64,
    /// Bounded join used during shutdown before a thread is detached
    pub join_timeout_ms: u64,
    /// Config-watcher poll interval
    pub config_poll_interval_ms: u64,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            idle_sleep_ms: 10,
            start_timeout_ms: 100,
            join_timeout_ms: 2000,
            config_poll_interval_ms: 500,
        }
    }
}

impl WorkersConfig {
    pub fn idle_sleep(&self) -> Duration {
        Duration::from_millis(self.idle_sleep_ms)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }

    pub fn config_poll_interval(&self) -> Duration {
        Duration::from_millis(self.config_poll_interval_ms)
    }
}

/// Text injection pacing
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InjectionConfig {
    /// Pause between deleting the shortcut and injecting the expansion
    pub expansion_delay_ms: u64,
    /// Pending injections buffered between processors and the injector worker
    pub pending_capacity: usize,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            expansion_delay_ms: 50,
            pending_capacity: 256,
        }
    }
}

impl InjectionConfig {
    pub fn expansion_delay(&self) -> Duration {
        Duration::from_millis(self.expansion_delay_ms)
    }
}

/// Typed-sequence tracking for trigger detection
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InputConfig {
    /// Character that starts a shortcut
    pub trigger_prefix: char,
    /// Buffer length that triggers trimming
    pub max_sequence_length: usize,
    /// Characters kept after trimming
    pub retained_sequence_length: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            trigger_prefix: '/',
            max_sequence_length: 100,
            retained_sequence_length: 50,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error)
    pub level: String,
    /// Directory for rolling log files (file logging disabled when unset)
    pub log_dir: Option<PathBuf>,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            with_target: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = CrossExpandConfig::default();
        assert_eq!(config.processing.processor_thread_count, 0);
        assert!(config.processing.enable_health_monitoring);
        assert_eq!(config.queue.queue_capacity_per_priority, 4096);
        assert_eq!(config.health.health_check_interval_seconds, 5);
        assert_eq!(config.health.max_queue_utilization, 0.8);
        assert_eq!(config.health.min_success_rate, 0.95);
        assert_eq!(config.health.max_response_time_seconds, 1);
        assert_eq!(config.workers.idle_sleep(), Duration::from_millis(10));
        assert_eq!(config.workers.start_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_auto_processor_count_is_positive() {
        let processing = ProcessingConfig::default();
        assert!(processing.effective_processor_thread_count() >= 1);

        let fixed = ProcessingConfig {
            processor_thread_count: 3,
            ..Default::default()
        };
        assert_eq!(fixed.effective_processor_thread_count(), 3);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config: CrossExpandConfig = toml::from_str(
            r#"
            [health]
            min_success_rate = 0.9

            [shortcuts]
            "/sig" = "Best regards"
            "#,
        )
        .unwrap();

        assert_eq!(config.health.min_success_rate, 0.9);
        assert_eq!(config.health.max_queue_utilization, 0.8);
        assert_eq!(config.shortcuts.get("/sig").map(String::as_str), Some("Best regards"));
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(CrossExpandConfig::default()).unwrap();
        assert_eq!(json["queue"]["queue_capacity_per_priority"], 4096);
    }
}
