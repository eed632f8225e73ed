use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OrderStatus, OrderType, Side};
use crate::error::{CoreError, CoreResult};
use crate::values::{Price, Quantity, SourceId, Symbol, Timestamp};

/// Unique identifier for an order
pub type OrderId = Uuid;

/// An order as submitted by a source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Source that produced the order (receives its outcome)
    pub source_id: SourceId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Quantity,
    /// Limit price for Limit orders, trigger price for Stop orders
    pub price: Option<Price>,
    /// Dollar amount risked to the protective stop
    pub stop_loss_amount: Option<Decimal>,
    /// Dollar amount targeted by the take-profit
    pub take_profit_amount: Option<Decimal>,
    pub status: OrderStatus,
    pub submitted_at: Timestamp,
}

impl Order {
    /// Create a new order with explicit timestamp
    pub fn new_with_time(
        source_id: impl Into<SourceId>,
        symbol: impl Into<Symbol>,
        side: Side,
        order_type: OrderType,
        quantity: Quantity,
        price: Option<Price>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id: source_id.into(),
            symbol: symbol.into(),
            side,
            order_type,
            quantity,
            price,
            stop_loss_amount: None,
            take_profit_amount: None,
            status: OrderStatus::Pending,
            submitted_at: timestamp,
        }
    }

    /// Market order stamped with the current system time
    pub fn market(
        source_id: impl Into<SourceId>,
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
    ) -> Self {
        Self::new_with_time(
            source_id,
            symbol,
            side,
            OrderType::Market,
            quantity,
            None,
            Utc::now(),
        )
    }

    /// Limit order stamped with the current system time
    pub fn limit(
        source_id: impl Into<SourceId>,
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
        price: Price,
    ) -> Self {
        Self::new_with_time(
            source_id,
            symbol,
            side,
            OrderType::Limit,
            quantity,
            Some(price),
            Utc::now(),
        )
    }

    /// Stop order stamped with the current system time
    pub fn stop(
        source_id: impl Into<SourceId>,
        symbol: impl Into<Symbol>,
        side: Side,
        quantity: Quantity,
        stop_price: Price,
    ) -> Self {
        Self::new_with_time(
            source_id,
            symbol,
            side,
            OrderType::Stop,
            quantity,
            Some(stop_price),
            Utc::now(),
        )
    }

    /// Use a caller-assigned id
    pub fn with_id(mut self, id: OrderId) -> Self {
        self.id = id;
        self
    }

    /// Attach a protective stop expressed as a dollar amount
    pub fn with_stop_loss(mut self, amount: Decimal) -> Self {
        self.stop_loss_amount = Some(amount);
        self
    }

    /// Attach a take-profit expressed as a dollar amount
    pub fn with_take_profit(mut self, amount: Decimal) -> Self {
        self.take_profit_amount = Some(amount);
        self
    }

    /// Price the order refers to, if it carries one
    pub fn reference_price(&self) -> Option<Price> {
        self.price
    }

    /// Check the order's static shape (independent of account state)
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |reason: String| CoreError::InvalidOrder {
            order_id: self.id,
            reason,
        };

        if self.quantity <= Decimal::ZERO {
            return Err(invalid(format!("quantity {} must be positive", self.quantity)));
        }
        if self.symbol.is_empty() {
            return Err(invalid("symbol is empty".to_string()));
        }
        match (self.order_type.requires_price(), self.price) {
            (true, None) => {
                return Err(invalid(format!("{:?} order requires a price", self.order_type)));
            }
            (_, Some(price)) if price <= Decimal::ZERO => {
                return Err(invalid(format!("price {} must be positive", price)));
            }
            _ => {}
        }
        if let Some(amount) = self.stop_loss_amount
            && amount <= Decimal::ZERO
        {
            return Err(invalid(format!("stop-loss amount {} must be positive", amount)));
        }
        if let Some(amount) = self.take_profit_amount
            && amount <= Decimal::ZERO
        {
            return Err(invalid(format!(
                "take-profit amount {} must be positive",
                amount
            )));
        }
        Ok(())
    }

    /// Move the order forward in its lifecycle
    pub fn transition(&mut self, next: OrderStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                order_id: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
