//! Domain errors

use crate::entities::{OrderId, OrderStatus};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("Duplicate instrument in catalog: {0}")]
    DuplicateInstrument(String),

    #[error("Invalid instrument {symbol}: {reason}")]
    InvalidInstrument { symbol: String, reason: String },

    #[error("Invalid order {order_id}: {reason}")]
    InvalidOrder { order_id: OrderId, reason: String },

    #[error("Invalid status transition for order {order_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
