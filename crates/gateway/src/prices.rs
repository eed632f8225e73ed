//! Latest-price book
//!
//! Concurrent last-value store fed by the price subjects and read by the
//! shadow adapter and the orchestrator's mark-to-market.

use crate::messages::market_data::PriceUpdate;
use crate::transport::Subscriber;
use dashmap::DashMap;
use keel_core::{Price, Symbol, Timestamp};
use keel_ports::PriceFeed;
use log::{debug, info};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Default)]
pub struct LatestPrices {
    prices: DashMap<Symbol, (Price, Timestamp)>,
}

impl LatestPrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a price; older timestamps than the stored one are ignored
    pub fn update(&self, symbol: impl Into<Symbol>, price: Price, timestamp: Timestamp) {
        let symbol = symbol.into();
        let mut entry = self.prices.entry(symbol).or_insert((price, timestamp));
        if timestamp >= entry.1 {
            *entry = (price, timestamp);
        }
    }

    pub fn apply(&self, update: &PriceUpdate) {
        self.update(update.symbol.clone(), update.price, update.timestamp());
    }

    /// Price and the time it was observed
    pub fn get(&self, symbol: &str) -> Option<(Price, Timestamp)> {
        self.prices.get(symbol).map(|entry| *entry)
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Feed this book from a price subscription until it closes
    pub fn spawn_feed<S>(self: &Arc<Self>, mut subscriber: S) -> JoinHandle<()>
    where
        S: Subscriber<PriceUpdate> + 'static,
    {
        let book = Arc::clone(self);
        tokio::spawn(async move {
            while let Ok(update) = subscriber.next().await {
                debug!("[PRICES] {} = {}", update.symbol, update.price);
                book.apply(&update);
            }
            info!("[PRICES] Feed closed");
        })
    }
}

impl PriceFeed for LatestPrices {
    fn last_price(&self, symbol: &str) -> Option<Price> {
        self.get(symbol).map(|(price, _)| price)
    }
}
