//! Risk Limits
//!
//! Static limits the Risk Manager validates orders against. Loaded by an
//! external collaborator (all fields have defaults, so partial documents work).

use chrono::NaiveTime;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How validation outcomes are enforced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnforcementMode {
    /// Live trading: any violation rejects the order
    #[default]
    Enforce,
    /// Shadow trading: violations are recorded, orders still flow
    Observe,
}

/// Limits applied to every candidate order
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Maximum quantity of a single order
    pub max_order_size: Decimal,
    /// Per-symbol order size limits (override `max_order_size`)
    pub max_order_size_by_symbol: HashMap<String, Decimal>,
    /// Maximum number of symbols with a non-flat position
    pub max_open_positions: usize,
    /// Maximum loss for the day in dollars (positive number)
    pub max_daily_loss: Decimal,
    /// Maximum stop-loss dollars per trade, as a percentage of equity
    pub max_risk_per_trade_pct: Decimal,
    /// Reject orders that carry no stop-loss amount
    pub require_stop_loss: bool,
    /// Window in which orders are admitted; `None` means always open
    pub trading_hours: Option<TradingHours>,
    /// Capacity of the violation audit ring buffer
    pub ledger_capacity: usize,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_order_size: dec!(10),
            max_order_size_by_symbol: HashMap::new(),
            max_open_positions: 5,
            max_daily_loss: dec!(5_000),
            max_risk_per_trade_pct: dec!(2),
            require_stop_loss: false,
            trading_hours: None,
            ledger_capacity: 1024,
        }
    }
}

impl RiskLimits {
    /// Order size limit for a symbol
    pub fn max_order_size_for(&self, symbol: &str) -> Decimal {
        self.max_order_size_by_symbol
            .get(symbol)
            .copied()
            .unwrap_or(self.max_order_size)
    }
}

/// Daily trading window in UTC
///
/// `start` is inclusive and `end` exclusive. A window whose start is after its
/// end wraps midnight (e.g. 23:00 → 22:00 for futures). Equal bounds mean the
/// window is open all day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingHours {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TradingHours {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start == self.end {
            true
        } else if self.start < self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}
