//! Instrument definitions and the read-only instrument catalog

mod catalog;
mod instrument;

pub use catalog::InstrumentCatalog;
pub use instrument::Instrument;
