//! Clock abstraction
//!
//! Every component takes its time source by injection so checkpoint
//! timestamps, expiry horizons, and conflict windows are deterministic under
//! test. Nothing in this crate calls `Utc::now()` directly.

use chrono::Duration;
use quicksave_core::Timestamp;
use std::sync::RwLock;

pub trait Clock: Send + Sync {
    /// Current instant in UTC.
    fn now(&self) -> Timestamp;
}

/// Production clock using system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now()
    }
}

/// Settable clock for deterministic tests.
///
/// Starts at a fixed instant and only moves when told to, making
/// window and expiry arithmetic reproducible.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<Timestamp>,
}

impl FixedClock {
    pub fn at(instant: Timestamp) -> Self {
        Self {
            now: RwLock::new(instant),
        }
    }

    pub fn set(&self, instant: Timestamp) {
        match self.now.write() {
            Ok(mut now) => *now = instant,
            Err(poisoned) => *poisoned.into_inner() = instant,
        }
    }

    pub fn advance(&self, by: Duration) {
        match self.now.write() {
            Ok(mut now) => *now = *now + by,
            Err(poisoned) => {
                let mut now = poisoned.into_inner();
                *now = *now + by;
            }
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        match self.now.read() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
