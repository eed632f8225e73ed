//! Position table
//!
//! Positions keyed by symbol, mutated only by applying fills. Each fill is
//! applied at most once (keyed by order id), and each symbol has a single
//! writer at a time (per-shard locking in the map).

use dashmap::{DashMap, DashSet};
use keel_core::{Fill, InstrumentCatalog, OrderId, Position, Symbol};
use keel_ports::PriceFeed;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::BTreeSet;

#[derive(Debug, Default)]
pub struct PositionTable {
    positions: DashMap<Symbol, Position>,
    applied: DashSet<OrderId>,
    realized_today: Mutex<Decimal>,
}

impl PositionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a fill, returning the dollar PnL it realized
    ///
    /// Returns `None` when a fill for the same order was already applied.
    pub fn apply(&self, fill: &Fill, multiplier: Decimal) -> Option<Decimal> {
        if !self.applied.insert(fill.order_id) {
            return None;
        }
        let realized = self
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::new(fill.symbol.clone()))
            .apply_fill(fill, multiplier);
        *self.realized_today.lock() += realized;
        Some(realized)
    }

    pub fn is_applied(&self, order_id: OrderId) -> bool {
        self.applied.contains(&order_id)
    }

    /// Drop the applied marker for an order; its position effect stays
    ///
    /// A later fill carrying the same order id would be applied again.
    pub fn forget(&self, order_id: OrderId) -> bool {
        self.applied.remove(&order_id).is_some()
    }

    /// Number of order ids remembered as applied
    pub fn applied_len(&self) -> usize {
        self.applied.len()
    }

    pub fn get(&self, symbol: &str) -> Option<Position> {
        self.positions.get(symbol).map(|p| p.clone())
    }

    /// All positions, ordered by symbol
    pub fn snapshot(&self) -> Vec<Position> {
        let mut all: Vec<_> = self.positions.iter().map(|p| p.clone()).collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }

    pub fn open_symbols(&self) -> BTreeSet<Symbol> {
        self.positions
            .iter()
            .filter(|p| !p.is_flat())
            .map(|p| p.symbol.clone())
            .collect()
    }

    /// Lifetime realized PnL across all symbols
    pub fn total_realized(&self) -> Decimal {
        self.positions.iter().map(|p| p.realized_pnl).sum()
    }

    /// Realized PnL since the last daily reset
    pub fn realized_today(&self) -> Decimal {
        *self.realized_today.lock()
    }

    /// Mark-to-market PnL of open positions; symbols without a price are skipped
    pub fn unrealized(&self, prices: &dyn PriceFeed, catalog: &InstrumentCatalog) -> Decimal {
        self.positions
            .iter()
            .filter(|p| !p.is_flat())
            .filter_map(|p| {
                let mark = prices.last_price(&p.symbol)?;
                let multiplier = catalog.multiplier(&p.symbol).ok()?;
                Some(p.unrealized_pnl(mark, multiplier))
            })
            .sum()
    }

    pub fn reset_daily(&self) -> Decimal {
        std::mem::take(&mut *self.realized_today.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keel_core::{Instrument, Price, Side};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use uuid::Uuid;

    struct Marks(HashMap<String, Price>);

    impl PriceFeed for Marks {
        fn last_price(&self, symbol: &str) -> Option<Price> {
            self.0.get(symbol).copied()
        }
    }

    fn fill(side: Side, qty: Decimal, price: Decimal) -> Fill {
        Fill::new(Uuid::new_v4(), "ES", side, price, qty, Utc::now())
    }

    #[test]
    fn test_fill_applied_exactly_once() {
        let table = PositionTable::new();
        let f = fill(Side::Long, dec!(2), dec!(5000));

        assert_eq!(table.apply(&f, dec!(50)), Some(dec!(0)));
        assert_eq!(table.apply(&f, dec!(50)), None);
        assert_eq!(table.get("ES").unwrap().quantity, dec!(2));
        assert!(table.is_applied(f.order_id));
    }

    #[test]
    fn test_forget_keeps_position() {
        let table = PositionTable::new();
        let f = fill(Side::Long, dec!(2), dec!(5000));
        table.apply(&f, dec!(50));

        assert!(table.forget(f.order_id));
        assert!(!table.forget(f.order_id));
        assert!(!table.is_applied(f.order_id));
        assert_eq!(table.applied_len(), 0);
        assert_eq!(table.get("ES").unwrap().quantity, dec!(2));
    }

    #[test]
    fn test_daily_realized_and_reset() {
        let table = PositionTable::new();
        table.apply(&fill(Side::Long, dec!(2), dec!(5000)), dec!(50));
        let pnl = table.apply(&fill(Side::Short, dec!(1), dec!(5004)), dec!(50));
        assert_eq!(pnl, Some(dec!(200)));
        assert_eq!(table.realized_today(), dec!(200));

        assert_eq!(table.reset_daily(), dec!(200));
        assert_eq!(table.realized_today(), dec!(0));
        assert_eq!(table.total_realized(), dec!(200));
    }

    #[test]
    fn test_unrealized_and_open_symbols() {
        let table = PositionTable::new();
        table.apply(&fill(Side::Long, dec!(1), dec!(5000)), dec!(50));
        let catalog =
            InstrumentCatalog::new([Instrument::new("ES", dec!(50), dec!(0.25)).unwrap()]).unwrap();

        let marks = Marks(HashMap::from([("ES".to_string(), dec!(4990))]));
        assert_eq!(table.unrealized(&marks, &catalog), dec!(-500));
        assert_eq!(table.open_symbols().len(), 1);

        let no_marks = Marks(HashMap::new());
        assert_eq!(table.unrealized(&no_marks, &catalog), dec!(0));
    }
}
