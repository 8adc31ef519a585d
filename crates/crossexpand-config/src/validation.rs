// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Ensures configuration values are within valid ranges before the worker
//! pool is built from them.

use crate::{ConfigError, ConfigResult, CrossExpandConfig};

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    NotPowerOfTwo { field: String, value: usize },
    OutOfRange { field: String, value: f64, min: f64, max: f64 },
    MustBePositive { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPowerOfTwo { field, value } => {
                write!(f, "{} = {} must be a power of two (>= 2)", field, value)
            }
            Self::OutOfRange {
                field,
                value,
                min,
                max,
            } => {
                write!(f, "{} = {} is outside valid range ({}-{})", field, value, min, max)
            }
            Self::MustBePositive { field } => write!(f, "{} must be greater than zero", field),
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Ring sizing (power of two slots)
/// - Ratio thresholds within `[0, 1]`
/// - Non-zero intervals and timeouts
/// - Sequence buffer limits
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &CrossExpandConfig) -> ConfigResult<()> {
    let errors = collect_violations(config);

    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

/// Every violation found in `config`, in section order
pub fn collect_violations(config: &CrossExpandConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();

    validate_queue(config, &mut errors);
    validate_health(config, &mut errors);
    validate_workers(config, &mut errors);
    validate_input(config, &mut errors);

    errors
}

fn validate_queue(config: &CrossExpandConfig, errors: &mut Vec<ConfigValidationError>) {
    let slots = config.queue.queue_capacity_per_priority;
    if slots < 2 || !slots.is_power_of_two() {
        errors.push(ConfigValidationError::NotPowerOfTwo {
            field: "queue.queue_capacity_per_priority".to_string(),
            value: slots,
        });
    }
}

fn validate_health(config: &CrossExpandConfig, errors: &mut Vec<ConfigValidationError>) {
    let health = &config.health;

    for (field, value) in [
        ("health.max_queue_utilization", health.max_queue_utilization),
        ("health.min_success_rate", health.min_success_rate),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigValidationError::OutOfRange {
                field: field.to_string(),
                value,
                min: 0.0,
                max: 1.0,
            });
        }
    }

    if health.health_check_interval_seconds == 0 {
        errors.push(ConfigValidationError::MustBePositive {
            field: "health.health_check_interval_seconds".to_string(),
        });
    }
    if health.max_response_time_seconds == 0 {
        errors.push(ConfigValidationError::MustBePositive {
            field: "health.max_response_time_seconds".to_string(),
        });
    }
}

fn validate_workers(config: &CrossExpandConfig, errors: &mut Vec<ConfigValidationError>) {
    let workers = &config.workers;

    for (field, value) in [
        ("workers.idle_sleep_ms", workers.idle_sleep_ms),
        ("workers.start_timeout_ms", workers.start_timeout_ms),
        ("workers.join_timeout_ms", workers.join_timeout_ms),
        ("workers.config_poll_interval_ms", workers.config_poll_interval_ms),
    ] {
        if value == 0 {
            errors.push(ConfigValidationError::MustBePositive {
                field: field.to_string(),
            });
        }
    }

    if config.injection.pending_capacity == 0 {
        errors.push(ConfigValidationError::MustBePositive {
            field: "injection.pending_capacity".to_string(),
        });
    }
}

fn validate_input(config: &CrossExpandConfig, errors: &mut Vec<ConfigValidationError>) {
    let input = &config.input;

    if input.trigger_prefix.is_whitespace() {
        errors.push(ConfigValidationError::InvalidValue {
            field: "input.trigger_prefix".to_string(),
            reason: "whitespace terminates shortcuts and cannot start one".to_string(),
        });
    }
    if input.retained_sequence_length == 0
        || input.retained_sequence_length >= input.max_sequence_length
    {
        errors.push(ConfigValidationError::InvalidValue {
            field: "input.retained_sequence_length".to_string(),
            reason: format!(
                "must be between 1 and max_sequence_length ({})",
                input.max_sequence_length
            ),
        });
    }
}
