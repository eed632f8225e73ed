//! Keel Clock Infrastructure
//!
//! Provides the two time sources the pipeline runs against:
//!
//! - [`SystemClock`]: wall-clock UTC for production
//! - [`ManualClock`]: frozen time that only moves when told to, for
//!   deterministic trading-hours and timestamp tests
//!
//! ```ignore
//! use keel_clock::{ManualClock, Clock};
//! use chrono::{Duration, TimeZone, Utc};
//!
//! let clock = ManualClock::at(Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap());
//! clock.advance(Duration::minutes(5));
//! assert_eq!(clock.now().format("%H:%M").to_string(), "14:35");
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use keel_ports::Clock;
