// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # CrossExpand Event Queue
//!
//! Keystroke events enter through [`EventQueue::push`] from the OS input
//! callback and leave through [`EventQueue::pop`] on event-processor threads.
//!
//! ## Architecture
//!
//! ```text
//!   input hook ──push──▶ ┌──────────────────────┐
//!                        │ Critical ring        │ ──┐
//!                        │ High ring            │   │ pop scans
//!                        │ Normal ring          │   │ top-down
//!                        │ Low ring             │ ◀─┘
//!                        └──────────────────────┘ ──pop──▶ processors (K threads)
//! ```
//!
//! - One bounded [`PriorityRing`] per [`Priority`], each safe for many
//!   producers and many consumers.
//! - Push and pop never block. A full ring drops the event and counts it.
//! - Pops are strict priority with no aging: sustained high-priority traffic
//!   starves lower levels.

pub mod queue;
pub mod ring;
pub mod types;

pub use queue::{EventQueue, QueueStats, DEFAULT_SLOTS_PER_PRIORITY};
pub use ring::PriorityRing;
pub use types::{Event, KeyPayload, Priority};

use thiserror::Error;

/// Event queue errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Ring slot count must be a power of two and at least 2
    #[error("Invalid ring slot count {0}: must be a power of two >= 2")]
    InvalidSlotCount(usize),

    /// The ring for this priority is full; the event was dropped
    #[error("Queue full for priority {priority}, dropped event #{sequence_id}")]
    Full { priority: Priority, sequence_id: u64 },
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
