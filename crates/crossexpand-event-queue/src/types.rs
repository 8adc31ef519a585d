// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Event data model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Event priority, ordered `Low < Normal < High < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Priority {
    Low = 0,
    Normal = 1,
    High = 2,
    Critical = 3,
}

impl Priority {
    /// Number of priority levels
    pub const COUNT: usize = 4;

    /// All levels, lowest first
    pub const ALL: [Priority; Priority::COUNT] =
        [Priority::Low, Priority::Normal, Priority::High, Priority::Critical];

    /// Ring index for this level
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single key transition reported by the input hook
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPayload {
    /// Platform keycode
    pub keycode: u32,
    /// Text produced by the key, if any
    pub character: Option<char>,
    pub pressed: bool,
    pub timestamp: Instant,
}

impl KeyPayload {
    pub fn new(keycode: u32, character: Option<char>, pressed: bool) -> Self {
        Self {
            keycode,
            character,
            pressed,
            timestamp: Instant::now(),
        }
    }

    /// Key-down carrying a character
    pub fn press(keycode: u32, character: char) -> Self {
        Self::new(keycode, Some(character), true)
    }

    /// Key-up (releases carry no text)
    pub fn release(keycode: u32) -> Self {
        Self::new(keycode, None, false)
    }
}

/// A queued keystroke
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub priority: Priority,
    pub payload: KeyPayload,
    /// Assigned by the queue at push time (diagnostic only)
    pub sequence_id: u64,
}

impl Event {
    /// Event awaiting a sequence id; the queue overwrites `sequence_id` on push
    pub fn new(payload: KeyPayload, priority: Priority) -> Self {
        Self {
            priority,
            payload,
            sequence_id: 0,
        }
    }
}
