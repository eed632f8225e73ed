use chrono::{Duration, Utc};
use keel_core::Timestamp;
use keel_ports::Clock;
use parking_lot::RwLock;

/// Fixed clock that only advances when explicitly moved
pub struct ManualClock {
    current_time: RwLock<Timestamp>,
}

impl ManualClock {
    /// Freeze time at the current wall-clock instant
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    /// Freeze time at a specific instant
    pub fn at(time: Timestamp) -> Self {
        Self {
            current_time: RwLock::new(time),
        }
    }

    /// Jump to an absolute time
    pub fn set(&self, time: Timestamp) {
        *self.current_time.write() = time;
    }

    /// Move time forward (or backward, for a negative duration)
    pub fn advance(&self, by: Duration) {
        let mut guard = self.current_time.write();
        *guard += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.current_time.read()
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}
