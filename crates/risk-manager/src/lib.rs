//! Keel Risk Manager
//!
//! Admission control for the order pipeline. Every candidate order is checked
//! against account and policy limits before it may be queued:
//!
//! - **Order Size**: maximum quantity per order (global, per-symbol overrides)
//! - **Open Positions**: maximum number of concurrently open positions
//! - **Daily Loss**: realized + mark-to-market loss vs. a daily limit
//! - **Trading Hours**: UTC window in which new orders are admitted
//! - **Per-Trade Risk**: stop-loss dollars as a percentage of equity
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      Risk Manager                         │
//! │                                                           │
//! │  Order + AccountState ──► all checks ──► ValidationResult │
//! │                                │                          │
//! │                                ▼                          │
//! │                      ViolationLedger (ring)               │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Enforcement
//!
//! | Enforce (live) | Observe (shadow) |
//! |----------------|------------------|
//! | any violation rejects | always valid |
//! | violations recorded | violations recorded |
//!
//! Every call is recorded in the ledger, clean ones included, so breach rates
//! can be computed over the buffered window.

pub mod account;
pub mod ledger;
pub mod manager;
pub mod parameters;
pub mod violation;

// Re-export main types
pub use account::AccountState;
pub use ledger::{AuditEntry, AuditOutcome, ViolationLedger};
pub use manager::RiskManager;
pub use parameters::{EnforcementMode, RiskLimits, TradingHours};
pub use violation::{RiskViolation, ValidationResult, ViolationKind};
