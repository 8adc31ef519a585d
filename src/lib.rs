//! # CrossExpand - text expansion event-routing core
//!
//! Keystrokes from an OS input hook are pushed into a prioritized,
//! bounded, lock-free event queue. A supervised pool of worker threads
//! drains it, detects typed shortcut triggers and replaces them with their
//! expansions, while a health monitor watches queue pressure and restarts
//! failed workers.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! crossexpand = "0.1"  # Default: queue + runtime
//! ```
//!
//! ## Feature Flags
//!
//! - **`queue`**: priority rings and the event queue only
//! - **`runtime`** (default): worker lifecycle, pool, health monitor
//!   (implies `queue`)
//! - **`observability`**: tracing subscriber setup and debug flags
//! - **`file-logging`**: rolling log files (implies `observability`)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use crossexpand::prelude::*;
//!
//! # fn services() -> PoolServices { unimplemented!() }
//! let pool = WorkerPool::new(PoolConfig::default(), services())?;
//! pool.initialize()?;
//!
//! let stats = pool.get_stats();
//! println!("{} workers, {} events", stats.total_threads, stats.total_events_processed);
//!
//! pool.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │  Foundation: crossexpand-config, -observability         │
//! │  (TOML + overrides, tracing setup)                      │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Queue: crossexpand-event-queue                         │
//! │  (one lock-free ring per priority, global sequencing)   │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Runtime: crossexpand-runtime                           │
//! │  (workers, pool topology, health supervision)           │
//! └─────────────────────────────────────────────────────────┘
//!                         ↓
//! ┌─────────────────────────────────────────────────────────┐
//! │  Application: crossexpand-daemon                        │
//! │  (stdin hook, terminal injector)                        │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## License
//!
//! Apache-2.0

#[cfg(feature = "queue")]
pub use crossexpand_event_queue as event_queue;

#[cfg(feature = "runtime")]
pub use crossexpand_config as config;

#[cfg(feature = "runtime")]
pub use crossexpand_runtime as runtime;

#[cfg(feature = "observability")]
pub use crossexpand_observability as observability;

/// Prelude - commonly used types and traits
pub mod prelude {
    #[cfg(feature = "queue")]
    pub use crate::event_queue::{Event, EventQueue, KeyPayload, Priority, PriorityRing, QueueStats};

    #[cfg(feature = "runtime")]
    pub use crate::config::{load_config, validate_config, CrossExpandConfig};

    #[cfg(feature = "runtime")]
    pub use crate::runtime::{
        HealthReport, HealthThresholds, InputHook, PoolConfig, PoolServices, ShortcutLookup, SystemStats,
        TextInjector, Verdict, Worker, WorkerPool, WorkerState, WorkerTask,
    };

    #[cfg(feature = "observability")]
    pub use crate::observability::{init_logging, LoggingSettings};
}
