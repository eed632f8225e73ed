use keel_core::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Account snapshot an order is validated against
///
/// Built by the orchestrator from its position table at submission time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountState {
    /// Account equity in dollars
    pub equity: Decimal,
    /// Realized PnL since the last daily reset
    pub realized_pnl: Decimal,
    /// Mark-to-market PnL of open positions
    pub unrealized_pnl: Decimal,
    /// Symbols with a non-flat position
    pub open_symbols: BTreeSet<Symbol>,
}

impl AccountState {
    pub fn new(equity: Decimal) -> Self {
        Self {
            equity,
            ..Default::default()
        }
    }

    /// Realized plus unrealized PnL for the day
    pub fn daily_pnl(&self) -> Decimal {
        self.realized_pnl + self.unrealized_pnl
    }

    /// Loss for the day as a positive number (zero when in profit)
    pub fn daily_loss(&self) -> Decimal {
        (-self.daily_pnl()).max(Decimal::ZERO)
    }

    pub fn open_positions(&self) -> usize {
        self.open_symbols.len()
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.open_symbols.contains(symbol)
    }
}
