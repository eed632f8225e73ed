use keel_core::{OrderId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which limit an order breached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ViolationKind {
    OrderSize,
    OpenPositions,
    DailyLoss,
    TradingHours,
    TradeRisk,
    MissingStopLoss,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationKind::OrderSize => "order size",
            ViolationKind::OpenPositions => "open positions",
            ViolationKind::DailyLoss => "daily loss",
            ViolationKind::TradingHours => "trading hours",
            ViolationKind::TradeRisk => "per-trade risk",
            ViolationKind::MissingStopLoss => "missing stop-loss",
        };
        f.write_str(name)
    }
}

/// A single limit breach
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskViolation {
    pub kind: ViolationKind,
    pub order_id: OrderId,
    /// The configured limit, rendered for audit
    pub threshold: String,
    /// The value that breached it
    pub observed: String,
    pub timestamp: Timestamp,
}

impl fmt::Display for RiskViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} limit breached: observed {}, limit {}",
            self.kind, self.observed, self.threshold
        )
    }
}

/// Outcome of validating one order
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    /// Whether the order may proceed to the queue
    pub valid: bool,
    /// Every breach found, recorded even when `valid` is forced in shadow mode
    pub violations: Vec<RiskViolation>,
}

impl ValidationResult {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Human-readable reasons, one per violation
    pub fn reasons(&self) -> Vec<String> {
        self.violations.iter().map(|v| v.to_string()).collect()
    }
}
