//! Market data message types

use keel_core::{Price, Timestamp};
use serde::{Deserialize, Serialize};

use super::{from_nanos, to_nanos};

/// Last traded price for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceUpdate {
    pub symbol: String,
    pub price: Price,
    pub timestamp_ns: i64,
}

impl PriceUpdate {
    pub fn new(symbol: impl Into<String>, price: Price, timestamp: Timestamp) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp_ns: to_nanos(timestamp),
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        from_nanos(self.timestamp_ns)
    }
}
