use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Instrument;
use crate::error::{CoreError, CoreResult};

/// Symbol → instrument lookup, consulted but never mutated by the pipeline
///
/// A missing entry is always an error. There is no fallback multiplier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Instrument>", into = "Vec<Instrument>")]
pub struct InstrumentCatalog {
    instruments: HashMap<String, Instrument>,
}

impl InstrumentCatalog {
    pub fn new(instruments: impl IntoIterator<Item = Instrument>) -> CoreResult<Self> {
        let mut map = HashMap::new();
        for instrument in instruments {
            let symbol = instrument.symbol().to_string();
            if map.insert(symbol.clone(), instrument).is_some() {
                return Err(CoreError::DuplicateInstrument(symbol));
            }
        }
        Ok(Self { instruments: map })
    }

    pub fn get(&self, symbol: &str) -> CoreResult<&Instrument> {
        self.instruments
            .get(symbol)
            .ok_or_else(|| CoreError::UnknownInstrument(symbol.to_string()))
    }

    /// Point value for a symbol
    pub fn multiplier(&self, symbol: &str) -> CoreResult<Decimal> {
        self.get(symbol).map(Instrument::multiplier)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.instruments.contains_key(symbol)
    }

    pub fn len(&self) -> usize {
        self.instruments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.instruments.keys().map(String::as_str)
    }
}

impl TryFrom<Vec<Instrument>> for InstrumentCatalog {
    type Error = CoreError;

    fn try_from(instruments: Vec<Instrument>) -> CoreResult<Self> {
        Self::new(instruments)
    }
}

impl From<InstrumentCatalog> for Vec<Instrument> {
    fn from(catalog: InstrumentCatalog) -> Self {
        catalog.instruments.into_values().collect()
    }
}
