//! Keel Core Domain
//!
//! Pure domain types for the Keel order pipeline.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod error;
pub mod instruments;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    Fill, Order, OrderId, OrderStatus, OrderType, Position, ProtectiveLevels, Side,
};
pub use error::{CoreError, CoreResult};
pub use instruments::{Instrument, InstrumentCatalog};
pub use values::{Price, Quantity, SourceId, Symbol, Timestamp};
