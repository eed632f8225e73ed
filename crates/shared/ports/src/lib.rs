//! Keel Ports
//!
//! Port definitions (traits) for the Keel order pipeline.
//! These define the boundaries between pipeline logic and infrastructure.

mod clock;
mod price_feed;

pub use clock::Clock;
pub use price_feed::PriceFeed;
