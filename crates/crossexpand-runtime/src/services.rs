// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! External collaborator boundaries
//!
//! The runtime never touches the OS directly. Keystrokes arrive through an
//! [`InputHook`], shortcuts resolve through a [`ShortcutLookup`] and text is
//! typed back through a [`TextInjector`]. None of these calls are retried.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crossexpand_event_queue::{EventQueue, KeyPayload, Priority};
use parking_lot::RwLock;
use thiserror::Error;

/// Errors reported by external services
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Shortcut not found: {0}")]
    NotFound(String),

    #[error("Input hook error: {0}")]
    Hook(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Variables available while expanding a shortcut
pub type ExpansionContext = HashMap<String, String>;

/// Chooses the queue priority for a key event
pub trait PriorityClassifier: Send + Sync {
    fn classify(&self, payload: &KeyPayload) -> Priority;
}

/// Presses are `Normal`, releases are `Low`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl PriorityClassifier for DefaultClassifier {
    fn classify(&self, payload: &KeyPayload) -> Priority {
        if payload.pressed {
            Priority::Normal
        } else {
            Priority::Low
        }
    }
}

/// Handed to the input hook at install time; pushes into the event queue
#[derive(Clone)]
pub struct KeySink {
    queue: Arc<EventQueue>,
    classifier: Arc<dyn PriorityClassifier>,
}

impl KeySink {
    pub fn new(queue: Arc<EventQueue>, classifier: Arc<dyn PriorityClassifier>) -> Self {
        Self { queue, classifier }
    }

    /// Enqueue a key event without blocking
    ///
    /// `false` means the event was dropped; the caller should carry on.
    pub fn submit(&self, payload: KeyPayload) -> bool {
        let priority = self.classifier.classify(&payload);
        self.queue.push_key(payload, priority).is_ok()
    }
}

/// OS keyboard hook producing key events
pub trait InputHook: Send {
    fn initialize(&mut self) -> ServiceResult<()>;

    /// Start delivering key events into `sink`
    fn install(&mut self, sink: KeySink) -> ServiceResult<()>;

    /// Deliver pending OS events; returns how many were submitted
    fn pump(&mut self) -> ServiceResult<usize>;

    fn uninstall(&mut self);
}

/// Resolves shortcut triggers to expansion text
///
/// Shared by every event processor, so calls take `&self`.
pub trait ShortcutLookup: Send + Sync {
    fn initialize(&self) -> ServiceResult<()>;

    fn contains(&self, trigger: &str) -> bool;

    fn expand(&self, trigger: &str, context: &ExpansionContext) -> ServiceResult<String>;

    /// New shortcut table after a configuration reload; ignored by default
    fn reload(&self, _shortcuts: &BTreeMap<String, String>) {}

    fn shutdown(&self) {}
}

/// Types text into the focused application
pub trait TextInjector: Send {
    fn initialize(&mut self) -> ServiceResult<()>;

    fn inject(&mut self, text: &str) -> bool;

    fn delete_previous_chars(&mut self, count: usize) -> bool;

    fn last_error(&self) -> Option<String>;

    fn shutdown(&mut self) {}
}

/// In-memory shortcut table with `{{name}}` variable substitution
#[derive(Debug, Default)]
pub struct MapShortcutLookup {
    shortcuts: RwLock<BTreeMap<String, String>>,
}

impl MapShortcutLookup {
    pub fn new(shortcuts: BTreeMap<String, String>) -> Self {
        Self {
            shortcuts: RwLock::new(shortcuts),
        }
    }

    /// Replace the whole table
    pub fn replace(&self, shortcuts: BTreeMap<String, String>) {
        *self.shortcuts.write() = shortcuts;
    }

    pub fn len(&self) -> usize {
        self.shortcuts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shortcuts.read().is_empty()
    }
}

impl ShortcutLookup for MapShortcutLookup {
    fn initialize(&self) -> ServiceResult<()> {
        Ok(())
    }

    fn contains(&self, trigger: &str) -> bool {
        self.shortcuts.read().contains_key(trigger)
    }

    fn expand(&self, trigger: &str, context: &ExpansionContext) -> ServiceResult<String> {
        let template = self
            .shortcuts
            .read()
            .get(trigger)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(trigger.to_string()))?;

        Ok(context.iter().fold(template, |text, (name, value)| {
            text.replace(&format!("{{{{{}}}}}", name), value)
        }))
    }

    fn reload(&self, shortcuts: &BTreeMap<String, String>) {
        self.replace(shortcuts.clone());
    }
}
