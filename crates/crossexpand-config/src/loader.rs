// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers win:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, CrossExpandConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "crossexpand.toml";

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "CROSSEXPAND_CONFIG_PATH";

/// Find the CrossExpand configuration file
///
/// Search order:
/// 1. `CROSSEXPAND_CONFIG_PATH` environment variable
/// 2. Current working directory: `./crossexpand.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by {} not found: {}",
            CONFIG_PATH_ENV,
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));

        let mut current = cwd.clone();
        for _ in 0..5 {
            if let Some(parent) = current.parent() {
                search_paths.push(parent.join(CONFIG_FILE_NAME));
                current = parent.to_path_buf();
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|path| path.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet {} to specify a custom location.",
        CONFIG_FILE_NAME, search_list, CONFIG_PATH_ENV
    )))
}

/// Load configuration from a TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the config file is not found or contains invalid TOML.
/// Validation is a separate step (`validate_config`).
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<CrossExpandConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config = load_config_from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

/// Parse configuration from TOML text without applying overrides
pub fn load_config_from_str(content: &str) -> ConfigResult<CrossExpandConfig> {
    Ok(toml::from_str(content)?)
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `CROSSEXPAND_PROCESSOR_THREADS` -> `processing.processor_thread_count`
/// - `CROSSEXPAND_HEALTH_MONITORING` -> `processing.enable_health_monitoring`
/// - `CROSSEXPAND_QUEUE_CAPACITY` -> `queue.queue_capacity_per_priority`
/// - `CROSSEXPAND_HEALTH_INTERVAL` -> `health.health_check_interval_seconds`
/// - `CROSSEXPAND_LOG_LEVEL` -> `logging.level`
/// - `CROSSEXPAND_LOG_DIR` -> `logging.log_dir`
pub fn apply_environment_overrides(config: &mut CrossExpandConfig) {
    apply_overrides_with(config, |key| env::var(key).ok());
}

/// Apply environment-style overrides from an arbitrary lookup
pub fn apply_overrides_with<F>(config: &mut CrossExpandConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(count) = lookup("CROSSEXPAND_PROCESSOR_THREADS").and_then(|v| v.parse().ok()) {
        config.processing.processor_thread_count = count;
    }
    if let Some(value) = lookup("CROSSEXPAND_HEALTH_MONITORING") {
        config.processing.enable_health_monitoring = parse_flag(&value);
    }
    if let Some(capacity) = lookup("CROSSEXPAND_QUEUE_CAPACITY").and_then(|v| v.parse().ok()) {
        config.queue.queue_capacity_per_priority = capacity;
    }
    if let Some(secs) = lookup("CROSSEXPAND_HEALTH_INTERVAL").and_then(|v| v.parse().ok()) {
        config.health.health_check_interval_seconds = secs;
    }
    if let Some(level) = lookup("CROSSEXPAND_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(dir) = lookup("CROSSEXPAND_LOG_DIR") {
        config.logging.log_dir = Some(PathBuf::from(dir));
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - e.g. `{"processor_thread_count": "4", "log_level": "debug"}`
pub fn apply_cli_overrides(config: &mut CrossExpandConfig, cli_args: &HashMap<String, String>) {
    if let Some(count) = cli_args
        .get("processor_thread_count")
        .and_then(|v| v.parse().ok())
    {
        config.processing.processor_thread_count = count;
    }
    if let Some(value) = cli_args.get("enable_health_monitoring") {
        config.processing.enable_health_monitoring = parse_flag(value);
    }
    if let Some(capacity) = cli_args
        .get("queue_capacity_per_priority")
        .and_then(|v| v.parse().ok())
    {
        config.queue.queue_capacity_per_priority = capacity;
    }
    if let Some(secs) = cli_args
        .get("health_check_interval_seconds")
        .and_then(|v| v.parse().ok())
    {
        config.health.health_check_interval_seconds = secs;
    }
    if let Some(level) = cli_args.get("log_level") {
        config.logging.level = level.clone();
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}
