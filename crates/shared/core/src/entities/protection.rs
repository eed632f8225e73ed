use serde::{Deserialize, Serialize};

use crate::entities::Side;
use crate::instruments::Instrument;
use crate::values::Price;

/// Stop-loss / take-profit price levels attached to an order or fill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtectiveLevels {
    pub stop_price: Option<Price>,
    pub take_profit_price: Option<Price>,
}

impl ProtectiveLevels {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.stop_price.is_none() && self.take_profit_price.is_none()
    }

    /// Snap both levels to the instrument's tick grid, toward the entry
    ///
    /// Rounding never moves a level further from the entry than requested,
    /// so the dollars at risk (and the profit target) never exceed the amounts
    /// the levels were derived from.
    pub fn rounded_to(&self, instrument: &Instrument, side: Side) -> Self {
        let (stop_price, take_profit_price) = match side {
            Side::Long => (
                self.stop_price.map(|p| instrument.round_price_up(p)),
                self.take_profit_price.map(|p| instrument.round_price_down(p)),
            ),
            Side::Short => (
                self.stop_price.map(|p| instrument.round_price_down(p)),
                self.take_profit_price.map(|p| instrument.round_price_up(p)),
            ),
        };
        Self {
            stop_price,
            take_profit_price,
        }
    }
}
