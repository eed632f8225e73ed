use keel_core::Price;

/// Port for the latest traded price per symbol
///
/// Market-data ingestion lives outside the pipeline; it only needs to keep
/// some implementation of this trait current.
pub trait PriceFeed: Send + Sync {
    /// Last traded price, `None` if nothing has been seen for the symbol
    fn last_price(&self, symbol: &str) -> Option<Price>;
}
