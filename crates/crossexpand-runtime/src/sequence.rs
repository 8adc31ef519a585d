// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Typed-sequence buffer and shortcut trigger detection
//!
//! Characters from key presses accumulate in a bounded buffer. When a
//! whitespace terminator (space, tab, newline) is typed, the text from the
//! last trigger prefix up to the terminator is the candidate trigger.

use crossexpand_config::InputConfig;
use crossexpand_event_queue::KeyPayload;

/// Trigger detection settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceSettings {
    pub trigger_prefix: char,
    /// Buffer length (in characters) that triggers a trim
    pub max_length: usize,
    /// Characters kept after a trim
    pub retained_length: usize,
}

impl Default for SequenceSettings {
    fn default() -> Self {
        Self {
            trigger_prefix: '/',
            max_length: 100,
            retained_length: 50,
        }
    }
}

impl From<&InputConfig> for SequenceSettings {
    fn from(config: &InputConfig) -> Self {
        Self {
            trigger_prefix: config.trigger_prefix,
            max_length: config.max_sequence_length,
            retained_length: config.retained_sequence_length,
        }
    }
}

fn is_terminator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n')
}

/// Rolling buffer of recently typed characters
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    settings: SequenceSettings,
    buffer: Vec<char>,
}

impl SequenceTracker {
    /// `retained_length` is raised to 1 so a trim always keeps the
    /// character just typed
    pub fn new(mut settings: SequenceSettings) -> Self {
        settings.retained_length = settings.retained_length.max(1);
        Self {
            settings,
            buffer: Vec::with_capacity(settings.max_length + 1),
        }
    }

    /// Record a key event; returns a candidate trigger when a terminator
    /// completes one
    ///
    /// Releases and keys without text are ignored.
    pub fn feed(&mut self, payload: &KeyPayload) -> Option<String> {
        if !payload.pressed {
            return None;
        }
        let c = payload.character?;

        self.buffer.push(c);
        if self.buffer.len() > self.settings.max_length {
            let excess = self.buffer.len().saturating_sub(self.settings.retained_length);
            self.buffer.drain(..excess);
        }

        if !is_terminator(c) {
            return None;
        }

        let (_, body) = self.buffer.split_last()?;
        let start = body.iter().rposition(|&ch| ch == self.settings.trigger_prefix)?;
        Some(body[start..].iter().collect())
    }

    /// Forget everything typed so far (after an expansion)
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_string(&self) -> String {
        self.buffer.iter().collect()
    }
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new(SequenceSettings::default())
    }
}
