//! The counters a scenario reports to its harness.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Incremented whenever an iteration fails with an error rather than a failed check.
pub const EXCEPTION: &str = "exception";

/// Incremented once per completed iteration, successful or not.
pub const ITERATIONS: &str = "iterations";

/// Receives the metrics emitted by a running scenario.
///
/// Implementations are shared between all virtual users and must not lose concurrent updates.
pub trait MetricsSink: fmt::Debug + Send + Sync {
    /// Adds one to the counter called `name`.
    fn increment(&self, name: &str);

    /// Records the outcome of a named check.
    fn check(&self, name: &str, passed: bool);
}

/// Pass and fail counts of a single check.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CheckTally {
    /// How often the check passed.
    pub passes: u64,
    /// How often the check failed.
    pub fails: u64,
}

/// A point-in-time copy of all counters and checks.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Snapshot {
    /// Counter values by name.
    pub counters: BTreeMap<String, u64>,
    /// Check tallies by check name.
    pub checks: BTreeMap<String, CheckTally>,
}

impl Snapshot {
    /// Value of the named counter, zero if it was never incremented.
    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or_default()
    }

    /// Sum of all check outcomes.
    pub fn check_totals(&self) -> CheckTally {
        self.checks
            .values()
            .fold(CheckTally::default(), |acc, tally| CheckTally {
                passes: acc.passes + tally.passes,
                fails: acc.fails + tally.fails,
            })
    }
}

/// An in-memory [`MetricsSink`].
#[derive(Debug, Default)]
pub struct Counters {
    inner: Mutex<Snapshot>,
}

impl Counters {
    /// Creates an empty set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of the named counter.
    pub fn get(&self, name: &str) -> u64 {
        self.lock().counter(name)
    }

    /// Copies out the current state.
    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Snapshot> {
        // Counters stay usable even if a panicking thread held the lock.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetricsSink for Counters {
    fn increment(&self, name: &str) {
        *self.lock().counters.entry(name.to_owned()).or_default() += 1;
    }

    fn check(&self, name: &str, passed: bool) {
        let mut inner = self.lock();
        let tally = inner.checks.entry(name.to_owned()).or_default();
        if passed {
            tally.passes += 1;
        } else {
            tally.fails += 1;
        }
    }
}
