use rust_decimal::Decimal;
use rust_decimal::prelude::Signed;
use serde::{Deserialize, Serialize};

use super::{Fill, Side};
use crate::values::{Price, Quantity, Symbol, Timestamp};

/// Net position in one instrument, built only from fills
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    /// Net quantity (positive=long, negative=short)
    pub quantity: Quantity,
    /// Average entry price of the open quantity
    pub avg_price: Price,
    /// Realized PnL in dollars (price points × quantity × multiplier)
    pub realized_pnl: Decimal,
    /// Number of fills applied
    pub fill_count: u64,
    pub updated_at: Option<Timestamp>,
}

impl Position {
    pub fn new(symbol: impl Into<Symbol>) -> Self {
        Self {
            symbol: symbol.into(),
            quantity: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            fill_count: 0,
            updated_at: None,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Direction of the open quantity, `None` when flat
    pub fn side(&self) -> Option<Side> {
        if self.quantity > Decimal::ZERO {
            Some(Side::Long)
        } else if self.quantity < Decimal::ZERO {
            Some(Side::Short)
        } else {
            None
        }
    }

    /// Apply a fill, returning the dollar PnL it realized
    pub fn apply_fill(&mut self, fill: &Fill, multiplier: Decimal) -> Decimal {
        let signed_qty = fill.quantity * fill.side.sign();
        let mut realized = Decimal::ZERO;

        // Closing (partially or fully) against the open quantity
        if (self.quantity > Decimal::ZERO && signed_qty < Decimal::ZERO)
            || (self.quantity < Decimal::ZERO && signed_qty > Decimal::ZERO)
        {
            let close_qty = signed_qty.abs().min(self.quantity.abs());
            let points = if self.quantity > Decimal::ZERO {
                fill.price - self.avg_price
            } else {
                self.avg_price - fill.price
            };
            realized = close_qty * points * multiplier;
        }

        let new_quantity = self.quantity + signed_qty;

        if new_quantity.is_zero() {
            self.avg_price = Decimal::ZERO;
        } else if (self.quantity >= Decimal::ZERO && signed_qty > Decimal::ZERO)
            || (self.quantity <= Decimal::ZERO && signed_qty < Decimal::ZERO)
        {
            // Adding to position - weighted average
            let total_cost = self.quantity.abs() * self.avg_price + fill.quantity * fill.price;
            self.avg_price = total_cost / new_quantity.abs();
        } else if new_quantity.signum() != self.quantity.signum() {
            // Flipped sides - remainder opened at the fill price
            self.avg_price = fill.price;
        }

        self.quantity = new_quantity;
        self.realized_pnl += realized;
        self.fill_count += 1;
        self.updated_at = Some(fill.timestamp);

        realized
    }

    /// Unrealized dollar PnL at a mark price
    pub fn unrealized_pnl(&self, mark_price: Price, multiplier: Decimal) -> Decimal {
        if self.quantity.is_zero() {
            return Decimal::ZERO;
        }
        (mark_price - self.avg_price) * self.quantity * multiplier
    }
}
