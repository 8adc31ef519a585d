// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # crossexpand-observability
//!
//! Logging setup shared by every CrossExpand binary, with per-crate debug
//! flag support.
//!
//! ## Features
//! - `file-logging`: daily-rolling log file next to console output

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod init;

pub use cli::*;
pub use init::*;

/// Known CrossExpand crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "crossexpand-config",
    "crossexpand-event-queue",
    "crossexpand-runtime",
    "crossexpand-daemon",
];
