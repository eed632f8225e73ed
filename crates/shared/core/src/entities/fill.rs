use serde::{Deserialize, Serialize};

use super::{OrderId, ProtectiveLevels, Side};
use crate::values::{Price, Quantity, Symbol, Timestamp};

/// Execution result for one order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    /// Executed price
    pub price: Price,
    /// Executed quantity
    pub quantity: Quantity,
    pub timestamp: Timestamp,
    /// Protective stop derived from the fill price
    pub stop_price: Option<Price>,
    /// Take-profit derived from the fill price
    pub take_profit_price: Option<Price>,
}

impl Fill {
    pub fn new(
        order_id: OrderId,
        symbol: impl Into<Symbol>,
        side: Side,
        price: Price,
        quantity: Quantity,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            order_id,
            symbol: symbol.into(),
            side,
            price,
            quantity,
            timestamp,
            stop_price: None,
            take_profit_price: None,
        }
    }

    /// Attach protective levels
    pub fn with_protection(mut self, levels: ProtectiveLevels) -> Self {
        self.stop_price = levels.stop_price;
        self.take_profit_price = levels.take_profit_price;
        self
    }

    pub fn protection(&self) -> ProtectiveLevels {
        ProtectiveLevels {
            stop_price: self.stop_price,
            take_profit_price: self.take_profit_price,
        }
    }
}
