// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Expansion pipeline counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

/// Lock-free counters updated by processors and the text injector
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    lookups: AtomicU64,
    expansions_attempted: AtomicU64,
    expansions_performed: AtomicU64,
    lookup_failures: AtomicU64,
    injection_failures: AtomicU64,
    response_nanos: AtomicU64,
}

/// Point-in-time copy of [`PipelineMetrics`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    pub lookups: u64,
    pub expansions_attempted: u64,
    pub expansions_performed: u64,
    pub lookup_failures: u64,
    pub injection_failures: u64,
    /// Trigger detection to injected text, averaged over performed expansions
    pub average_response_time: Duration,
    pub success_rate: f64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A trigger was detected and looked up; counts as an attempted expansion
    pub fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        self.expansions_attempted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_lookup_failure(&self) {
        self.lookup_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_injection_failure(&self) {
        self.injection_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Text was injected; `response_time` runs from detection to completion
    pub fn record_expansion(&self, response_time: Duration) {
        self.expansions_performed.fetch_add(1, Ordering::Relaxed);
        self.response_nanos
            .fetch_add(response_time.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn expansions_performed(&self) -> u64 {
        self.expansions_performed.load(Ordering::Relaxed)
    }

    /// Successful over attempted expansions (1.0 before any attempt)
    pub fn success_rate(&self) -> f64 {
        let attempted = self.expansions_attempted.load(Ordering::Relaxed);
        if attempted == 0 {
            1.0
        } else {
            self.expansions_performed() as f64 / attempted as f64
        }
    }

    pub fn average_response_time(&self) -> Duration {
        let performed = self.expansions_performed();
        if performed == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos(self.response_nanos.load(Ordering::Relaxed) / performed)
        }
    }

    pub fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            lookups: self.lookups.load(Ordering::Relaxed),
            expansions_attempted: self.expansions_attempted.load(Ordering::Relaxed),
            expansions_performed: self.expansions_performed(),
            lookup_failures: self.lookup_failures.load(Ordering::Relaxed),
            injection_failures: self.injection_failures.load(Ordering::Relaxed),
            average_response_time: self.average_response_time(),
            success_rate: self.success_rate(),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.lookups,
            &self.expansions_attempted,
            &self.expansions_performed,
            &self.lookup_failures,
            &self.injection_failures,
            &self.response_nanos,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate_defaults_to_one() {
        let metrics = PipelineMetrics::new();
        assert_eq!(metrics.success_rate(), 1.0);
        assert_eq!(metrics.average_response_time(), Duration::ZERO);
    }

    #[test]
    fn test_success_rate_and_response_time() {
        let metrics = PipelineMetrics::new();
        for _ in 0..4 {
            metrics.record_lookup();
        }
        metrics.record_expansion(Duration::from_millis(100));
        metrics.record_expansion(Duration::from_millis(300));
        metrics.record_expansion(Duration::from_millis(200));
        metrics.record_injection_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.expansions_attempted, 4);
        assert_eq!(snapshot.expansions_performed, 3);
        assert_eq!(snapshot.injection_failures, 1);
        assert!((snapshot.success_rate - 0.75).abs() < f64::EPSILON);
        assert_eq!(snapshot.average_response_time, Duration::from_millis(200));

        metrics.reset();
        assert_eq!(metrics.snapshot(), PipelineSnapshot {
            success_rate: 1.0,
            ..PipelineSnapshot::default()
        });
    }
}
