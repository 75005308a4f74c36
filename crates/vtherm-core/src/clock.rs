//! Injectable time source
//!
//! Wall time is never read directly by the regulation logic; every
//! consumer takes a Clock so tests can drive staleness and timestamps
//! deterministically.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, RwLock};

/// A source of the current time
pub trait Clock: Send + Sync {
    /// The current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A controllable clock for tests
#[derive(Clone)]
pub struct ManualClock {
    current: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// Create a clock starting at a specific time
    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            current: Arc::new(RwLock::new(time)),
        }
    }

    /// Set the current time
    pub fn set(&self, time: DateTime<Utc>) {
        *self.current.write().unwrap() = time;
    }

    /// Advance time by a duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.write().unwrap();
        *current = *current + duration;
    }

    /// Advance time by seconds
    pub fn advance_seconds(&self, seconds: i64) {
        self.advance(Duration::seconds(seconds));
    }

    /// Advance time by minutes
    pub fn advance_minutes(&self, minutes: i64) {
        self.advance(Duration::minutes(minutes));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.read().unwrap()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(Utc::now())
    }
}
