//! Execution message types

use keel_core::{Fill, Order, OrderType, ProtectiveLevels, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::from_nanos;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }
}

impl From<Side> for OrderSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderTypeWire {
    Market,
    Limit,
    Stop,
}

impl From<OrderType> for OrderTypeWire {
    fn from(order_type: OrderType) -> Self {
        match order_type {
            OrderType::Market => OrderTypeWire::Market,
            OrderType::Limit => OrderTypeWire::Limit,
            OrderType::Stop => OrderTypeWire::Stop,
        }
    }
}

/// Execution request sent to the external gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Client-assigned order ID for correlation
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderTypeWire,
    pub quantity: Decimal,
    /// Limit price or stop trigger
    pub price: Option<Decimal>,
    /// Protective stop attached to the parent order
    pub stop_price: Option<Decimal>,
    /// Take-profit attached to the parent order
    pub take_profit_price: Option<Decimal>,
}

impl ExecutionRequest {
    pub fn from_order(order: &Order, protection: ProtectiveLevels) -> Self {
        Self {
            client_order_id: order.id.to_string(),
            symbol: order.symbol.clone(),
            side: order.side.into(),
            order_type: order.order_type.into(),
            quantity: order.quantity,
            price: order.price,
            stop_price: protection.stop_price,
            take_profit_price: protection.take_profit_price,
        }
    }
}

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecStatusWire {
    Filled,
    PartiallyFilled,
    Rejected,
}

impl ExecStatusWire {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Filled => "filled",
            Self::PartiallyFilled => "partially_filled",
            Self::Rejected => "rejected",
        }
    }
}

/// Execution report returned by the external gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub client_order_id: String,
    pub status: ExecStatusWire,
    pub filled_qty: Decimal,
    pub avg_price: Option<Decimal>,
    pub reject_reason: Option<String>,
    pub timestamp_ns: i64,
}

impl ExecutionReport {
    /// Report a complete fill of the request
    pub fn filled(request: &ExecutionRequest, price: Decimal, timestamp_ns: i64) -> Self {
        Self {
            client_order_id: request.client_order_id.clone(),
            status: ExecStatusWire::Filled,
            filled_qty: request.quantity,
            avg_price: Some(price),
            reject_reason: None,
            timestamp_ns,
        }
    }

    pub fn rejected(
        request: &ExecutionRequest,
        reason: impl Into<String>,
        timestamp_ns: i64,
    ) -> Self {
        Self {
            client_order_id: request.client_order_id.clone(),
            status: ExecStatusWire::Rejected,
            filled_qty: Decimal::ZERO,
            avg_price: None,
            reject_reason: Some(reason.into()),
            timestamp_ns,
        }
    }

    /// Convert a (partially) filled report into a Fill for `order`
    ///
    /// Returns `Err(reason)` for rejections and malformed reports.
    pub fn into_fill(self, order: &Order) -> Result<Fill, String> {
        if self.client_order_id != order.id.to_string() {
            return Err(format!(
                "report for {} does not match order {}",
                self.client_order_id, order.id
            ));
        }
        match self.status {
            ExecStatusWire::Rejected => Err(self
                .reject_reason
                .unwrap_or_else(|| "rejected without reason".to_string())),
            ExecStatusWire::Filled | ExecStatusWire::PartiallyFilled => {
                let price = self
                    .avg_price
                    .ok_or_else(|| format!("{} report without price", self.status.as_str()))?;
                if self.filled_qty <= Decimal::ZERO {
                    return Err(format!("{} report with no quantity", self.status.as_str()));
                }
                Ok(Fill::new(
                    order.id,
                    order.symbol.clone(),
                    order.side,
                    price,
                    self.filled_qty,
                    from_nanos(self.timestamp_ns),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::to_nanos;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_request_carries_protection() {
        let order = Order::limit("bot-a", "ES", Side::Short, dec!(2), dec!(5000));
        let req = ExecutionRequest::from_order(
            &order,
            ProtectiveLevels {
                stop_price: Some(dec!(5010)),
                take_profit_price: Some(dec!(4980)),
            },
        );
        assert_eq!(req.side, OrderSide::Sell);
        assert_eq!(req.order_type, OrderTypeWire::Limit);
        assert_eq!(req.stop_price, Some(dec!(5010)));
        assert_eq!(req.client_order_id, order.id.to_string());
    }

    #[test]
    fn test_partial_report_becomes_fill() {
        let order = Order::market("bot-a", "ES", Side::Long, dec!(3));
        let req = ExecutionRequest::from_order(&order, ProtectiveLevels::none());
        let mut report = ExecutionReport::filled(&req, dec!(5001.25), to_nanos(Utc::now()));
        report.status = ExecStatusWire::PartiallyFilled;
        report.filled_qty = dec!(1);

        let fill = report.into_fill(&order).unwrap();
        assert_eq!(fill.quantity, dec!(1));
        assert_eq!(fill.price, dec!(5001.25));
        assert_eq!(fill.side, Side::Long);
    }

    #[test]
    fn test_rejection_and_mismatch_are_errors() {
        let order = Order::market("bot-a", "ES", Side::Long, dec!(1));
        let req = ExecutionRequest::from_order(&order, ProtectiveLevels::none());

        let rejected = ExecutionReport::rejected(&req, "market closed", 0);
        assert_eq!(rejected.into_fill(&order).unwrap_err(), "market closed");

        let other = Order::market("bot-a", "ES", Side::Long, dec!(1));
        let report = ExecutionReport::filled(&req, dec!(5000), 0);
        assert!(report.into_fill(&other).is_err());
    }
}
