// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Multi-priority event queue facade

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, warn};

use crate::ring::PriorityRing;
use crate::types::{Event, KeyPayload, Priority};
use crate::{QueueError, QueueResult};

/// Ring slots per priority when none is configured (holds 4095 events)
pub const DEFAULT_SLOTS_PER_PRIORITY: usize = 4096;

/// Pushes required before the drop rate counts against health
const DROP_RATE_MIN_PUSHES: u64 = 1000;

/// Maximum tolerated lifetime drop rate
const MAX_DROP_RATE: f64 = 0.01;

/// Log the first drop per priority, then every Nth
const DROP_LOG_INTERVAL: u64 = 1000;

/// Point-in-time queue statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueStats {
    pub total_pushed: u64,
    pub total_popped: u64,
    pub total_dropped: u64,
    /// Indexed by `Priority::index()`
    pub drops_by_priority: [u64; Priority::COUNT],
    /// Indexed by `Priority::index()`
    pub current_sizes: [usize; Priority::COUNT],
    pub uptime_seconds: f64,
    /// `total_popped / uptime_seconds`, 0 when uptime is 0
    pub events_per_second: f64,
}

impl QueueStats {
    /// Lifetime `total_dropped / total_pushed` (0 before any push)
    pub fn drop_rate(&self) -> f64 {
        if self.total_pushed == 0 {
            0.0
        } else {
            self.total_dropped as f64 / self.total_pushed as f64
        }
    }

    pub fn total_size(&self) -> usize {
        self.current_sizes.iter().sum()
    }
}

/// One ring per priority with shared sequence numbering and statistics
///
/// Safe to share by `Arc` between any number of producers and consumers.
pub struct EventQueue {
    rings: [PriorityRing<Event>; Priority::COUNT],
    next_sequence_id: AtomicU64,
    total_pushed: AtomicU64,
    total_popped: AtomicU64,
    drops_by_priority: [AtomicU64; Priority::COUNT],
    start_time: RwLock<Instant>,
}

impl EventQueue {
    /// Create a queue with [`DEFAULT_SLOTS_PER_PRIORITY`] slots per ring
    pub fn new() -> Self {
        Self::build(DEFAULT_SLOTS_PER_PRIORITY)
            .unwrap_or_else(|_| unreachable!("default slot count is a power of two"))
    }

    /// Create a queue with `slots_per_priority` slots in every ring
    ///
    /// # Errors
    ///
    /// `QueueError::InvalidSlotCount` unless the count is a power of two >= 2
    pub fn with_capacity(slots_per_priority: usize) -> QueueResult<Self> {
        Self::build(slots_per_priority)
    }

    fn build(slots: usize) -> QueueResult<Self> {
        let mut rings = Vec::with_capacity(Priority::COUNT);
        for _ in 0..Priority::COUNT {
            rings.push(PriorityRing::with_slots(slots)?);
        }
        let rings: [PriorityRing<Event>; Priority::COUNT] = rings
            .try_into()
            .map_err(|_| QueueError::InvalidSlotCount(slots))?;

        debug!(
            "EventQueue created: {} priorities x {} usable slots",
            Priority::COUNT,
            slots - 1
        );

        Ok(Self {
            rings,
            next_sequence_id: AtomicU64::new(0),
            total_pushed: AtomicU64::new(0),
            total_popped: AtomicU64::new(0),
            drops_by_priority: std::array::from_fn(|_| AtomicU64::new(0)),
            start_time: RwLock::new(Instant::now()),
        })
    }

    /// Enqueue an event on the ring for its priority
    ///
    /// Overwrites `event.sequence_id` with the next global id and returns it.
    /// A dropped event still consumes its id.
    ///
    /// # Errors
    ///
    /// `QueueError::Full` when the ring is full; the event is discarded.
    pub fn push(&self, mut event: Event) -> QueueResult<u64> {
        let sequence_id = self.next_sequence_id.fetch_add(1, Ordering::Relaxed);
        event.sequence_id = sequence_id;
        let priority = event.priority;

        // Counted before the event becomes visible to consumers, so a
        // snapshot never shows more pops than pushes
        self.total_pushed.fetch_add(1, Ordering::Relaxed);
        match self.rings[priority.index()].try_push(event) {
            Ok(()) => Ok(sequence_id),
            Err(_dropped) => {
                self.total_pushed.fetch_sub(1, Ordering::Relaxed);
                let drops = self.drops_by_priority[priority.index()].fetch_add(1, Ordering::Relaxed) + 1;
                if drops == 1 || drops % DROP_LOG_INTERVAL == 0 {
                    warn!(
                        "Event queue full at priority {}, dropped event #{} ({} drops at this priority)",
                        priority, sequence_id, drops
                    );
                }
                Err(QueueError::Full {
                    priority,
                    sequence_id,
                })
            }
        }
    }

    /// Build an event from a key payload and enqueue it
    pub fn push_key(&self, payload: KeyPayload, priority: Priority) -> QueueResult<u64> {
        self.push(Event::new(payload, priority))
    }

    /// Dequeue the oldest event of the highest non-empty priority
    pub fn pop(&self) -> Option<Event> {
        for priority in Priority::ALL.iter().rev() {
            if let Some(event) = self.rings[priority.index()].try_pop() {
                self.total_popped.fetch_add(1, Ordering::Release);
                return Some(event);
            }
        }
        None
    }

    pub fn get_stats(&self) -> QueueStats {
        let drops_by_priority: [u64; Priority::COUNT] =
            std::array::from_fn(|i| self.drops_by_priority[i].load(Ordering::Relaxed));
        let current_sizes: [usize; Priority::COUNT] = std::array::from_fn(|i| self.rings[i].size());
        // Popped first: every pop it covers has its push already counted
        let total_popped = self.total_popped.load(Ordering::Acquire);
        let total_pushed = self.total_pushed.load(Ordering::Relaxed);
        let uptime_seconds = self.start_time.read().elapsed().as_secs_f64();
        let events_per_second = if uptime_seconds > 0.0 {
            total_popped as f64 / uptime_seconds
        } else {
            0.0
        };

        QueueStats {
            total_pushed,
            total_popped,
            total_dropped: drops_by_priority.iter().sum(),
            drops_by_priority,
            current_sizes,
            uptime_seconds,
            events_per_second,
        }
    }

    /// False if any ring is full, or if the drop rate exceeds 1% after more
    /// than 1000 pushes
    pub fn is_healthy(&self) -> bool {
        if self.rings.iter().any(PriorityRing::full) {
            return false;
        }

        let pushed = self.total_pushed.load(Ordering::Relaxed);
        if pushed > DROP_RATE_MIN_PUSHES {
            let dropped: u64 = self
                .drops_by_priority
                .iter()
                .map(|d| d.load(Ordering::Relaxed))
                .sum();
            if dropped as f64 / pushed as f64 > MAX_DROP_RATE {
                return false;
            }
        }
        true
    }

    /// Used slots over usable capacity, across all rings
    pub fn utilization(&self) -> f64 {
        let capacity: usize = self.rings.iter().map(PriorityRing::capacity).sum();
        self.total_size() as f64 / capacity as f64
    }

    pub fn priority_utilization(&self, priority: Priority) -> f64 {
        self.rings[priority.index()].utilization()
    }

    /// Events currently queued across all priorities
    pub fn total_size(&self) -> usize {
        self.rings.iter().map(PriorityRing::size).sum()
    }

    /// Usable capacity of each ring
    pub fn capacity_per_priority(&self) -> usize {
        self.rings[0].capacity()
    }

    /// Zero the counters and restart the uptime clock
    ///
    /// Events still queued stay counted as pushed, so
    /// `total_pushed - total_popped == total_size()` keeps holding once
    /// they are popped.
    pub fn reset_stats(&self) {
        self.total_popped.store(0, Ordering::Release);
        self.total_pushed.store(self.total_size() as u64, Ordering::Relaxed);
        for drops in &self.drops_by_priority {
            drops.store(0, Ordering::Relaxed);
        }
        *self.start_time.write() = Instant::now();
        debug!("EventQueue statistics reset");
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventQueue")
            .field("total_size", &self.total_size())
            .field("capacity_per_priority", &self.capacity_per_priority())
            .finish()
    }
}
