// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # CrossExpand Daemon
//!
//! Terminal stand-ins for the OS services the runtime expects, so the full
//! worker topology can run headless:
//!
//! - [`LineInputHook`]: each character read from a line source becomes a
//!   key press/release pair
//! - [`ConsoleInjector`]: deletions become backspace sequences and expansions
//!   are written as plain text

pub mod console_injector;
pub mod line_hook;

pub use console_injector::ConsoleInjector;
pub use line_hook::LineInputHook;

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
