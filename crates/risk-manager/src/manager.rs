//! Risk Manager
//!
//! Validates candidate orders against [`RiskLimits`] and an [`AccountState`]
//! snapshot. All checks run on every call so the full violation set reaches
//! the audit ledger; the [`EnforcementMode`] only decides whether a breach
//! rejects the order.

use keel_core::{Order, Timestamp};
use keel_ports::Clock;
use log::{debug, info, warn};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use crate::account::AccountState;
use crate::ledger::{AuditEntry, AuditOutcome, ViolationLedger};
use crate::parameters::{EnforcementMode, RiskLimits};
use crate::violation::{RiskViolation, ValidationResult, ViolationKind};

pub struct RiskManager {
    limits: RiskLimits,
    mode: EnforcementMode,
    clock: Arc<dyn Clock>,
    ledger: Mutex<ViolationLedger>,
}

impl RiskManager {
    pub fn new(limits: RiskLimits, mode: EnforcementMode, clock: Arc<dyn Clock>) -> Self {
        let ledger = ViolationLedger::new(limits.ledger_capacity);
        info!(
            "[RISK] Started in {:?} mode (max size {}, max positions {}, max daily loss {})",
            mode, limits.max_order_size, limits.max_open_positions, limits.max_daily_loss
        );
        Self {
            limits,
            mode,
            clock,
            ledger: Mutex::new(ledger),
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    pub fn mode(&self) -> EnforcementMode {
        self.mode
    }

    /// Validate an order against the account snapshot
    ///
    /// Every call is appended to the ledger, clean or not.
    pub fn validate(&self, order: &Order, account: &AccountState) -> ValidationResult {
        let now = self.clock.now();
        let mut violations = Vec::new();

        self.check_order_size(order, now, &mut violations);
        self.check_open_positions(order, account, now, &mut violations);
        self.check_daily_loss(order, account, now, &mut violations);
        self.check_trading_hours(order, now, &mut violations);
        self.check_trade_risk(order, account, now, &mut violations);
        self.check_stop_loss_required(order, now, &mut violations);

        let valid = match self.mode {
            EnforcementMode::Enforce => violations.is_empty(),
            EnforcementMode::Observe => true,
        };

        if violations.is_empty() {
            debug!("[RISK] Order {} passed all checks", order.id);
        } else {
            for v in &violations {
                match self.mode {
                    EnforcementMode::Enforce => {
                        warn!("[RISK REJECTED] Order {} {}: {}", order.id, order.symbol, v)
                    }
                    EnforcementMode::Observe => {
                        info!("[RISK OBSERVED] Order {} {}: {}", order.id, order.symbol, v)
                    }
                }
            }
        }

        let outcome = if violations.is_empty() {
            AuditOutcome::Clean
        } else {
            AuditOutcome::Breached(violations.clone())
        };
        self.ledger.lock().record(AuditEntry {
            order_id: order.id,
            timestamp: now,
            mode: self.mode,
            outcome,
        });

        ValidationResult { valid, violations }
    }

    /// Run a closure against the audit ledger
    pub fn with_ledger<R>(&self, f: impl FnOnce(&ViolationLedger) -> R) -> R {
        f(&self.ledger.lock())
    }

    pub fn recent_violations(&self, n: usize) -> Vec<AuditEntry> {
        self.ledger.lock().recent(n)
    }

    pub fn breach_rate(&self) -> f64 {
        self.ledger.lock().breach_rate()
    }

    fn check_order_size(&self, order: &Order, now: Timestamp, out: &mut Vec<RiskViolation>) {
        let max = self.limits.max_order_size_for(&order.symbol);
        if order.quantity > max {
            out.push(violation(
                ViolationKind::OrderSize,
                order,
                max,
                order.quantity,
                now,
            ));
        }
    }

    fn check_open_positions(
        &self,
        order: &Order,
        account: &AccountState,
        now: Timestamp,
        out: &mut Vec<RiskViolation>,
    ) {
        // Orders on a symbol already held don't open a new position
        if account.has_position(&order.symbol) {
            return;
        }
        let open = account.open_positions();
        if open >= self.limits.max_open_positions {
            out.push(violation(
                ViolationKind::OpenPositions,
                order,
                self.limits.max_open_positions,
                open,
                now,
            ));
        }
    }

    fn check_daily_loss(
        &self,
        order: &Order,
        account: &AccountState,
        now: Timestamp,
        out: &mut Vec<RiskViolation>,
    ) {
        let loss = account.daily_loss();
        if loss >= self.limits.max_daily_loss {
            out.push(violation(
                ViolationKind::DailyLoss,
                order,
                self.limits.max_daily_loss,
                loss,
                now,
            ));
        }
    }

    fn check_trading_hours(&self, order: &Order, now: Timestamp, out: &mut Vec<RiskViolation>) {
        if let Some(hours) = &self.limits.trading_hours
            && !hours.contains(now.time())
        {
            out.push(violation(
                ViolationKind::TradingHours,
                order,
                format!("{}-{} UTC", hours.start, hours.end),
                now.time().format("%H:%M:%S"),
                now,
            ));
        }
    }

    fn check_trade_risk(
        &self,
        order: &Order,
        account: &AccountState,
        now: Timestamp,
        out: &mut Vec<RiskViolation>,
    ) {
        if account.equity <= Decimal::ZERO {
            out.push(violation(
                ViolationKind::TradeRisk,
                order,
                "positive equity",
                account.equity,
                now,
            ));
            return;
        }
        let Some(risk) = order.stop_loss_amount else {
            return;
        };
        let risk_pct = (risk / account.equity * dec!(100)).round_dp(4);
        if risk_pct > self.limits.max_risk_per_trade_pct {
            out.push(violation(
                ViolationKind::TradeRisk,
                order,
                format!("{}%", self.limits.max_risk_per_trade_pct),
                format!("{}%", risk_pct),
                now,
            ));
        }
    }

    fn check_stop_loss_required(
        &self,
        order: &Order,
        now: Timestamp,
        out: &mut Vec<RiskViolation>,
    ) {
        if self.limits.require_stop_loss && order.stop_loss_amount.is_none() {
            out.push(violation(
                ViolationKind::MissingStopLoss,
                order,
                "stop-loss required",
                "none",
                now,
            ));
        }
    }
}

fn violation(
    kind: ViolationKind,
    order: &Order,
    threshold: impl ToString,
    observed: impl ToString,
    timestamp: Timestamp,
) -> RiskViolation {
    RiskViolation {
        kind,
        order_id: order.id,
        threshold: threshold.to_string(),
        observed: observed.to_string(),
        timestamp,
    }
}
