// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Bounded, non-blocking ring for a single priority level
//!
//! Backed by `crossbeam::queue::ArrayQueue`: head/tail indices are
//! coordinated with acquire/release ordering and every slot carries a stamp
//! that is published only after the value is written, so a consumer never
//! reads a half-written slot. The stamp protocol also holds with several
//! producers and several consumers on the same ring.

use crossbeam::queue::ArrayQueue;

use crate::{QueueError, QueueResult};

/// Fixed-capacity ring with try-semantics
///
/// A ring built with `n` slots (power of two) holds `n - 1` items; one slot
/// is reserved so full and empty stay distinguishable.
pub struct PriorityRing<T> {
    items: ArrayQueue<T>,
    slot_count: usize,
}

impl<T> PriorityRing<T> {
    /// Create a ring with `slot_count` slots
    ///
    /// # Errors
    ///
    /// `QueueError::InvalidSlotCount` unless `slot_count` is a power of two >= 2
    pub fn with_slots(slot_count: usize) -> QueueResult<Self> {
        if slot_count < 2 || !slot_count.is_power_of_two() {
            return Err(QueueError::InvalidSlotCount(slot_count));
        }
        Ok(Self {
            items: ArrayQueue::new(slot_count - 1),
            slot_count,
        })
    }

    /// Append `item`, handing it back if the ring is full
    #[inline]
    pub fn try_push(&self, item: T) -> Result<(), T> {
        self.items.push(item)
    }

    /// Take the oldest item, `None` if the ring is empty
    #[inline]
    pub fn try_pop(&self) -> Option<T> {
        self.items.pop()
    }

    /// Items currently held
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Usable capacity (`slot_count - 1`)
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn full(&self) -> bool {
        self.items.is_full()
    }

    pub fn empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Occupied fraction of the usable capacity
    pub fn utilization(&self) -> f64 {
        self.size() as f64 / self.capacity() as f64
    }
}

impl<T> std::fmt::Debug for PriorityRing<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityRing")
            .field("size", &self.size())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_is_slots_minus_one() {
        let ring: PriorityRing<u32> = PriorityRing::with_slots(8).unwrap();
        assert_eq!(ring.capacity(), 7);
        assert_eq!(ring.slot_count(), 8);
        assert!(ring.empty());
        assert!(!ring.full());
    }

    #[test]
    fn test_rejects_invalid_slot_counts() {
        for slots in [0, 1, 3, 100, 4095] {
            assert_eq!(
                PriorityRing::<u8>::with_slots(slots).unwrap_err(),
                QueueError::InvalidSlotCount(slots)
            );
        }
    }

    #[test]
    fn test_push_fails_only_when_full() {
        let ring = PriorityRing::with_slots(4).unwrap();
        assert!(ring.try_push(1).is_ok());
        assert!(ring.try_push(2).is_ok());
        assert!(ring.try_push(3).is_ok());
        assert!(ring.full());
        assert_eq!(ring.try_push(4), Err(4));
        assert_eq!(ring.size(), 3);
    }

    #[test]
    fn test_fifo_and_empty_pop() {
        let ring = PriorityRing::with_slots(4).unwrap();
        ring.try_push('a').unwrap();
        ring.try_push('b').unwrap();
        assert_eq!(ring.try_pop(), Some('a'));
        assert_eq!(ring.try_pop(), Some('b'));
        assert_eq!(ring.try_pop(), None);
        assert!(ring.empty());
    }

    #[test]
    fn test_wraps_around_many_times() {
        let ring = PriorityRing::with_slots(2).unwrap();
        for i in 0..100 {
            ring.try_push(i).unwrap();
            assert!(ring.full());
            assert_eq!(ring.try_pop(), Some(i));
        }
        assert_eq!(ring.utilization(), 0.0);
    }
}
