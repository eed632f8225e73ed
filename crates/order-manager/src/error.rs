//! Order Manager errors

use keel_core::{CoreError, OrderId};
use keel_gateway::ExecutionError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Order {order_id} rejected by risk checks: {}", .reasons.join("; "))]
    ValidationRejected {
        order_id: OrderId,
        reasons: Vec<String>,
    },

    #[error("Queue full: capacity {capacity}")]
    QueueOverflow { capacity: usize },

    #[error("Order {0} not found or no longer cancellable")]
    CancelNotFound(OrderId),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Source already registered: {0}")]
    DuplicateSource(String),

    #[error("Duplicate order id: {0}")]
    DuplicateOrder(OrderId),

    #[error("Invalid order: {0}")]
    InvalidOrder(#[from] CoreError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Calculation error: {0}")]
    Calculation(#[from] CalculationError),

    #[error("Order manager is shutting down")]
    ShuttingDown,
}

pub type Result<T> = std::result::Result<T, Error>;

/// SL/TP derivation failures. Fatal for the order, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalculationError {
    #[error("No multiplier for {0}")]
    MissingMultiplier(String),

    #[error("Invalid multiplier {multiplier} for {symbol}")]
    InvalidMultiplier { symbol: String, multiplier: Decimal },

    #[error("Invalid quantity {0}")]
    InvalidQuantity(Decimal),

    #[error("Invalid dollar amount {0}")]
    InvalidAmount(Decimal),

    #[error("Stop price {stop} at or below zero (fill {fill_price})")]
    StopBelowZero { stop: Decimal, fill_price: Decimal },

    #[error("Take-profit price {target} at or below zero (fill {fill_price})")]
    TargetBelowZero { target: Decimal, fill_price: Decimal },
}

/// Why one execution attempt failed
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Calculation(#[from] CalculationError),
}

impl DispatchError {
    /// Timeouts and gateway failures are retried, calculation errors are not
    pub fn is_retryable(&self) -> bool {
        matches!(self, DispatchError::Execution(_))
    }

    /// Machine-readable reason code reported to sources
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::Execution(ExecutionError::Timeout { .. }) => "execution_timeout",
            DispatchError::Execution(ExecutionError::Failed(_)) => "execution_failed",
            DispatchError::Calculation(_) => "calculation_error",
        }
    }
}
