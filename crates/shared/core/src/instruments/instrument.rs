use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::values::{Price, Symbol};

/// Contract specification used for dollar and price-grid math
///
/// Immutable once constructed; both the multiplier and the tick size are
/// strictly positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "InstrumentFields")]
pub struct Instrument {
    symbol: Symbol,
    /// Dollars per one point of price movement for one contract
    multiplier: Decimal,
    /// Minimum price increment
    tick_size: Price,
}

#[derive(Deserialize)]
struct InstrumentFields {
    symbol: Symbol,
    multiplier: Decimal,
    tick_size: Price,
}

impl TryFrom<InstrumentFields> for Instrument {
    type Error = CoreError;

    fn try_from(fields: InstrumentFields) -> CoreResult<Self> {
        Instrument::new(fields.symbol, fields.multiplier, fields.tick_size)
    }
}

impl Instrument {
    pub fn new(symbol: impl Into<Symbol>, multiplier: Decimal, tick_size: Price) -> CoreResult<Self> {
        let symbol = symbol.into();
        if symbol.is_empty() {
            return Err(CoreError::InvalidInstrument {
                symbol,
                reason: "symbol is empty".to_string(),
            });
        }
        if multiplier <= Decimal::ZERO {
            return Err(CoreError::InvalidInstrument {
                symbol,
                reason: format!("multiplier {} must be positive", multiplier),
            });
        }
        if tick_size <= Decimal::ZERO {
            return Err(CoreError::InvalidInstrument {
                symbol,
                reason: format!("tick size {} must be positive", tick_size),
            });
        }
        Ok(Self {
            symbol,
            multiplier,
            tick_size,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn multiplier(&self) -> Decimal {
        self.multiplier
    }

    pub fn tick_size(&self) -> Price {
        self.tick_size
    }

    /// Round a price down to the nearest valid tick
    pub fn round_price_down(&self, price: Price) -> Price {
        (price / self.tick_size).floor() * self.tick_size
    }

    /// Round a price up to the nearest valid tick
    pub fn round_price_up(&self, price: Price) -> Price {
        (price / self.tick_size).ceil() * self.tick_size
    }
}
