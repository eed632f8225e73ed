//! Execution stage
//!
//! The dispatch handler the queue drives: derives pre-trade protective levels
//! from a reference price, executes through the selected adapter, then
//! recomputes the levels from the actual fill.

use async_trait::async_trait;
use keel_core::{Fill, Order, ProtectiveLevels};
use keel_gateway::ExecutionAdapter;
use keel_ports::PriceFeed;
use log::{debug, error};
use std::sync::Arc;

use crate::error::DispatchError;
use crate::queue::DispatchHandler;
use crate::sltp::SltpCalculator;

pub struct ExecutionStage {
    adapter: Arc<dyn ExecutionAdapter>,
    sltp: SltpCalculator,
    prices: Arc<dyn PriceFeed>,
}

impl ExecutionStage {
    pub fn new(
        adapter: Arc<dyn ExecutionAdapter>,
        sltp: SltpCalculator,
        prices: Arc<dyn PriceFeed>,
    ) -> Self {
        Self {
            adapter,
            sltp,
            prices,
        }
    }

    /// Levels attached to the execution request
    ///
    /// Uses the order's own price, else the last market price. Without either
    /// the request goes out bare and levels are set from the fill.
    pub fn pre_trade_levels(&self, order: &Order) -> Result<ProtectiveLevels, DispatchError> {
        if order.stop_loss_amount.is_none() && order.take_profit_amount.is_none() {
            return Ok(ProtectiveLevels::none());
        }
        let reference = order
            .reference_price()
            .or_else(|| self.prices.last_price(&order.symbol));
        let Some(reference) = reference else {
            debug!("[EXEC] No reference price for {}, levels set after fill", order.id);
            return Ok(ProtectiveLevels::none());
        };
        Ok(self.sltp.levels_for(
            &order.symbol,
            order.side,
            reference,
            order.quantity,
            order.stop_loss_amount,
            order.take_profit_amount,
        )?)
    }
}

#[async_trait]
impl DispatchHandler for ExecutionStage {
    async fn dispatch(&self, order: &Order, attempt: u32) -> Result<Fill, DispatchError> {
        // Missing instrument is fatal before anything leaves the process
        self.sltp.for_symbol(&order.symbol)?;
        let protection = self.pre_trade_levels(order)?;

        debug!(
            "[EXEC] Attempt {} for {} via {:?} adapter",
            attempt,
            order.id,
            self.adapter.kind()
        );
        let fill = self.adapter.execute(order, protection).await?;

        if order.stop_loss_amount.is_none() && order.take_profit_amount.is_none() {
            return Ok(fill);
        }
        match self
            .sltp
            .levels_for_fill(&fill, order.stop_loss_amount, order.take_profit_amount)
        {
            Ok(levels) => Ok(fill.with_protection(levels)),
            Err(e) => {
                // The trade happened; keep it and the levels sent with the request
                error!(
                    "[EXEC] Order {} filled @ {} but protective levels failed: {}",
                    order.id, fill.price, e
                );
                Ok(fill.with_protection(protection))
            }
        }
    }
}
