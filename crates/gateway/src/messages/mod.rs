//! Wire message types for gateway communication
//!
//! The normalized format exchanged with the external gateway and the price
//! feed. Timestamps travel as Unix nanoseconds.

pub mod market_data;
pub mod order;

pub use market_data::PriceUpdate;
pub use order::{ExecStatusWire, ExecutionReport, ExecutionRequest, OrderSide, OrderTypeWire};

use chrono::{DateTime, Utc};
use keel_core::Timestamp;

/// Unix nanoseconds (0 outside the representable range)
pub fn to_nanos(ts: Timestamp) -> i64 {
    ts.timestamp_nanos_opt().unwrap_or(0)
}

pub fn from_nanos(ns: i64) -> Timestamp {
    DateTime::<Utc>::from_timestamp_nanos(ns)
}
