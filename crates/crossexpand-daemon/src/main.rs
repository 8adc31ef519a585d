use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossexpand_config::{
    apply_cli_overrides, apply_environment_overrides, load_config, validate_config, ConfigError,
    CrossExpandConfig,
};
use crossexpand_daemon::{ConsoleInjector, LineInputHook};
use crossexpand_observability::{debug_flags_help, init_logging, CrateDebugFlags, LoggingSettings, DEBUG_ENV};
use crossexpand_runtime::{MapShortcutLookup, PoolConfig, PoolServices, WorkerPool};
use tracing::{error, info, warn};

/// CrossExpand daemon - keystrokes from stdin, expansions to stdout
#[derive(Parser, Debug)]
#[command(name = "crossexpand-daemon", version, long_about = None, after_help = debug_flags_help())]
struct Args {
    /// Configuration file (defaults to the standard search path)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Event processor threads (0 = one per core)
    #[arg(short, long)]
    processors: Option<usize>,

    /// Disable the health monitor
    #[arg(long, default_value_t = false)]
    no_health: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Log pool statistics every N seconds (0 = only at shutdown)
    #[arg(long, default_value_t = 0)]
    stats_interval: u64,
}

fn main() -> Result<()> {
    // `--debug-{crate}` flags are handled outside clap
    let (debug_args, cli_args): (Vec<String>, Vec<String>) =
        env::args().partition(|arg| arg.starts_with("--debug-"));
    let args = Args::parse_from(cli_args);
    let mut debug_flags = CrateDebugFlags::from_args(debug_args);
    if let Ok(value) = env::var(DEBUG_ENV) {
        debug_flags.merge_env_value(&value);
    }

    let (config, config_path) = load(&args)?;

    let _logging = init_logging(
        &LoggingSettings {
            level: config.logging.level.clone(),
            log_dir: config.logging.log_dir.clone(),
            with_target: config.logging.with_target,
        },
        &debug_flags,
    )?;

    match &config_path {
        Some(path) => info!("Configuration loaded from {}", path.display()),
        None => info!("No configuration file found; using defaults"),
    }
    info!("{} shortcuts loaded", config.shortcuts.len());

    let mut pool_config = PoolConfig::from_config(&config);
    if let Some(path) = config_path {
        pool_config = pool_config.with_config_path(path);
    }

    let services = PoolServices::new(
        Box::new(LineInputHook::stdin()),
        Arc::new(MapShortcutLookup::new(config.shortcuts.clone())),
        Box::new(ConsoleInjector::stdout()),
    );
    let pool = WorkerPool::new(pool_config, services).context("Failed to build worker pool")?;

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Shutdown signal received...");
        r.store(false, Ordering::SeqCst);
    })?;

    pool.initialize().context("Failed to start worker pool")?;
    info!("CrossExpand daemon running (Press Ctrl+C to stop)...");

    run(&pool, &running, args.stats_interval);

    pool.shutdown();
    let stats = pool.get_stats();
    info!(
        "Processed {} events, performed {} expansions in {:.1}s",
        stats.total_events_processed, stats.total_expansions_performed, stats.uptime_seconds
    );
    match serde_json::to_string_pretty(&stats) {
        Ok(json) => info!("Final statistics:\n{}", json),
        Err(e) => warn!("Could not serialize statistics: {}", e),
    }
    Ok(())
}

/// Resolve the configuration file and apply overrides
///
/// A missing file is only an error when one was named explicitly.
fn load(args: &Args) -> Result<(CrossExpandConfig, Option<PathBuf>)> {
    let mut overrides = HashMap::new();
    if let Some(processors) = args.processors {
        overrides.insert("processor_thread_count".to_string(), processors.to_string());
    }
    if args.no_health {
        overrides.insert("enable_health_monitoring".to_string(), "false".to_string());
    }
    if let Some(level) = &args.log_level {
        overrides.insert("log_level".to_string(), level.clone());
    }

    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => match crossexpand_config::find_config_file() {
            Ok(path) => Some(path),
            Err(ConfigError::FileNotFound(_)) => None,
            Err(e) => return Err(e.into()),
        },
    };

    let config = match &path {
        Some(path) => load_config(Some(path.as_path()), Some(&overrides))
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => {
            let mut config = CrossExpandConfig::default();
            apply_environment_overrides(&mut config);
            apply_cli_overrides(&mut config, &overrides);
            config
        }
    };
    validate_config(&config).context("Invalid configuration")?;
    Ok((config, path))
}

fn run(pool: &WorkerPool, running: &AtomicBool, stats_interval: u64) {
    let stats_every = Duration::from_secs(stats_interval);
    let mut last_stats = Instant::now();

    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(100));

        if !pool.is_running() {
            error!("Worker pool stopped unexpectedly");
            break;
        }

        if stats_interval > 0 && last_stats.elapsed() >= stats_every {
            last_stats = Instant::now();
            let stats = pool.get_stats();
            info!(
                "{}/{} workers active, {:.1} events/s, {} expansions, queue {:.0}% full",
                stats.active_threads,
                stats.total_threads,
                stats.events_per_second,
                stats.total_expansions_performed,
                pool.queue().utilization() * 100.0
            );
            if let Some(report) = pool.last_health_report() {
                if !report.is_healthy() {
                    warn!("Health: {} ({})", report.verdict, report.issues.join("; "));
                }
            }
        }
    }
}
