//! Shadow execution
//!
//! Synthesizes fills from the latest known market price. Never contacts an
//! external system. Latency is drawn from a normal distribution (clamped at
//! zero) and the price is moved against the order by a fixed slippage.

use crate::adapters::{AdapterKind, ExecutionAdapter};
use crate::error::{ExecutionError, GatewayError};
use async_trait::async_trait;
use keel_core::{Fill, Order, OrderType, Price, ProtectiveLevels, Side};
use keel_ports::{Clock, PriceFeed};
use log::{debug, info};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    /// Mean simulated latency (ms)
    pub latency_mean_ms: f64,
    /// Standard deviation of simulated latency (ms)
    pub latency_std_dev_ms: f64,
    /// Adverse slippage in basis points
    pub slippage_bps: Decimal,
    /// Probability that an attempt fails (0.0 - 1.0)
    pub failure_rate: f64,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            latency_mean_ms: 50.0,
            latency_std_dev_ms: 10.0,
            slippage_bps: dec!(1),
            failure_rate: 0.0,
            seed: None,
        }
    }
}

pub struct ShadowAdapter {
    config: ShadowConfig,
    latency: Normal<f64>,
    prices: Arc<dyn PriceFeed>,
    clock: Arc<dyn Clock>,
    rng: Mutex<StdRng>,
}

impl ShadowAdapter {
    pub fn new(
        config: ShadowConfig,
        prices: Arc<dyn PriceFeed>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, GatewayError> {
        let latency = Normal::new(config.latency_mean_ms, config.latency_std_dev_ms)
            .map_err(|e| GatewayError::Config(format!("latency distribution: {}", e)))?;
        if !(0.0..=1.0).contains(&config.failure_rate) {
            return Err(GatewayError::Config(format!(
                "failure_rate {} outside [0, 1]",
                config.failure_rate
            )));
        }
        if config.slippage_bps < Decimal::ZERO {
            return Err(GatewayError::Config(format!(
                "slippage_bps {} is negative",
                config.slippage_bps
            )));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            config,
            latency,
            prices,
            clock,
            rng: Mutex::new(rng),
        })
    }

    /// Market price moved against the order
    ///
    /// `None` when a LIMIT order is not marketable: a buy whose slipped price is
    /// above its limit, or a sell whose slipped price is below it.
    pub fn fill_price(&self, order: &Order, market: Price) -> Option<Price> {
        let slip = market * self.config.slippage_bps / dec!(10_000);
        let slipped = match order.side {
            Side::Long => market + slip,
            Side::Short => market - slip,
        };
        match (order.order_type, order.price) {
            (OrderType::Limit, Some(limit)) => {
                let marketable = match order.side {
                    Side::Long => slipped <= limit,
                    Side::Short => slipped >= limit,
                };
                marketable.then_some(slipped)
            }
            _ => Some(slipped),
        }
    }
}

#[async_trait]
impl ExecutionAdapter for ShadowAdapter {
    fn kind(&self) -> AdapterKind {
        AdapterKind::Shadow
    }

    async fn execute(
        &self,
        order: &Order,
        protection: ProtectiveLevels,
    ) -> Result<Fill, ExecutionError> {
        let (delay_ms, fail) = {
            let mut rng = self.rng.lock();
            let delay = self.latency.sample(&mut *rng).max(0.0);
            let fail = self.config.failure_rate > 0.0 && rng.gen_bool(self.config.failure_rate);
            (delay, fail)
        };
        tokio::time::sleep(Duration::from_secs_f64(delay_ms / 1_000.0)).await;

        if fail {
            return Err(ExecutionError::Failed("simulated gateway failure".to_string()));
        }

        let market = self.prices.last_price(&order.symbol).ok_or_else(|| {
            ExecutionError::Failed(format!("no market price for {}", order.symbol))
        })?;
        let price = self.fill_price(order, market).ok_or_else(|| {
            debug!(
                "[SHADOW] Limit {} @ {:?} not marketable against {}",
                order.id, order.price, market
            );
            ExecutionError::Failed(format!(
                "limit not marketable: {:?} {} vs market {}",
                order.side,
                order.price.unwrap_or_default(),
                market
            ))
        })?;

        info!(
            "[SHADOW] Filled {} {:?} {} {} @ {} (market {}, latency {:.1}ms)",
            order.id, order.side, order.quantity, order.symbol, price, market, delay_ms
        );

        Ok(Fill::new(
            order.id,
            order.symbol.clone(),
            order.side,
            price,
            order.quantity,
            self.clock.now(),
        )
        .with_protection(protection))
    }
}
