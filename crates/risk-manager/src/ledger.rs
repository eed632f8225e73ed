//! Violation audit ledger
//!
//! Bounded ring buffer of validation outcomes. Clean checks are recorded too so
//! breach rates can be computed over the buffered window.

use keel_core::{OrderId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::parameters::EnforcementMode;
use crate::violation::RiskViolation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Clean,
    Breached(Vec<RiskViolation>),
}

/// One validation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub order_id: OrderId,
    pub timestamp: Timestamp,
    pub mode: EnforcementMode,
    pub outcome: AuditOutcome,
}

impl AuditEntry {
    pub fn is_breach(&self) -> bool {
        matches!(self.outcome, AuditOutcome::Breached(_))
    }

    pub fn violations(&self) -> &[RiskViolation] {
        match &self.outcome {
            AuditOutcome::Clean => &[],
            AuditOutcome::Breached(violations) => violations,
        }
    }
}

#[derive(Debug)]
pub struct ViolationLedger {
    entries: VecDeque<AuditEntry>,
    capacity: usize,
    total_checks: u64,
    total_breaches: u64,
}

impl ViolationLedger {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            total_checks: 0,
            total_breaches: 0,
        }
    }

    /// Append an entry, evicting the oldest when full
    pub fn record(&mut self, entry: AuditEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.total_checks += 1;
        if entry.is_breach() {
            self.total_breaches += 1;
        }
        self.entries.push_back(entry);
    }

    /// Up to `n` most recent entries, oldest first
    pub fn recent(&self, n: usize) -> Vec<AuditEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).cloned().collect()
    }

    pub fn entries_for(&self, order_id: OrderId) -> Vec<AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.order_id == order_id)
            .cloned()
            .collect()
    }

    /// Fraction of buffered checks that breached at least one limit
    pub fn breach_rate(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        let breaches = self.entries.iter().filter(|e| e.is_breach()).count();
        breaches as f64 / self.entries.len() as f64
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lifetime number of validation calls (not bounded by capacity)
    pub fn total_checks(&self) -> u64 {
        self.total_checks
    }

    /// Lifetime number of calls with at least one violation
    pub fn total_breaches(&self) -> u64 {
        self.total_breaches
    }
}
