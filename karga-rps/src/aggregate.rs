use std::sync::atomic::{AtomicU64, Ordering};

use karga::Aggregate;

use crate::executor::Outcome;

/// Success and failure counters shared by every in-flight request.
///
/// Increments are relaxed atomics. Readers that need the final values must
/// first join every task that may still increment; the join orders those
/// increments before the read.
#[derive(Debug, Default)]
pub struct Counters {
    success: AtomicU64,
    failure: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_success(&self) {
        self.success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failure(&self) {
        self.failure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record(&self, outcome: &Outcome) {
        if outcome.is_success() {
            self.increment_success();
        } else {
            self.increment_failure();
        }
    }

    pub fn success_count(&self) -> u64 {
        self.success.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failure.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> Tally {
        Tally {
            success_count: self.success_count(),
            failure_count: self.failure_count(),
        }
    }
}

/// Point-in-time copy of [`Counters`].
///
/// Also usable as a karga aggregate so the same outcome classification can
/// be folded by any karga executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub success_count: u64,
    pub failure_count: u64,
}

impl Tally {
    pub fn total(&self) -> u64 {
        self.success_count + self.failure_count
    }
}

impl Aggregate for Tally {
    type Metric = Outcome;

    fn new() -> Self {
        Self::default()
    }

    fn consume(&mut self, metric: &Self::Metric) {
        if metric.is_success() {
            self.success_count += 1;
        } else {
            self.failure_count += 1;
        }
    }

    fn merge(&mut self, other: Self) {
        self.success_count += other.success_count;
        self.failure_count += other.failure_count;
    }
}
