//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Source of monotonic time, expressed in absolute milliseconds.
///
/// All protocol deadlines are absolute values on this clock. The origin
/// is arbitrary but fixed for the lifetime of the clock; values never
/// decrease.
pub trait Clock: std::fmt::Debug + Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Clock backed by the OS monotonic clock, with the process start as
/// origin.
#[derive(Debug)]
pub struct MonotonicClock {
    start: Instant,
}

/// Manually driven clock for tests and deterministic simulation.
///
/// Clones share the same time value.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

// ===== impl MonotonicClock =====

impl MonotonicClock {
    pub fn new() -> MonotonicClock {
        MonotonicClock {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> MonotonicClock {
        MonotonicClock::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.start.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

// ===== impl ManualClock =====

impl ManualClock {
    pub fn new(now: u64) -> ManualClock {
        ManualClock {
            now: Arc::new(AtomicU64::new(now)),
        }
    }

    /// Moves the clock forward by the given number of milliseconds.
    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::Relaxed);
    }

    /// Sets the absolute time. The new value must not be in the past.
    pub fn set(&self, now: u64) {
        debug_assert!(now >= self.now.load(Ordering::Relaxed));
        self.now.store(now, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }
}

// ===== unit tests =====
