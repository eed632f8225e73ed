//! Stop-loss / take-profit derivation
//!
//! Converts dollar amounts into price levels around an entry price:
//!
//! ```text
//! distance = dollars / (quantity × multiplier)
//! dollars  = |level - entry| × quantity × multiplier
//! ```
//!
//! Long positions put the stop below the entry and the target above; shorts
//! the reverse. The multiplier always comes from the instrument catalog.

use keel_core::{Fill, InstrumentCatalog, Price, ProtectiveLevels, Quantity, Side};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::error::CalculationError;

pub type CalcResult<T> = std::result::Result<T, CalculationError>;

/// Catalog-backed calculator
#[derive(Debug, Clone)]
pub struct SltpCalculator {
    catalog: Arc<InstrumentCatalog>,
}

impl SltpCalculator {
    pub fn new(catalog: Arc<InstrumentCatalog>) -> Self {
        Self { catalog }
    }

    /// Multiplier for a symbol; absence is an error, never a default
    pub fn for_symbol(&self, symbol: &str) -> CalcResult<Decimal> {
        self.catalog
            .multiplier(symbol)
            .map_err(|_| CalculationError::MissingMultiplier(symbol.to_string()))
    }

    /// Levels around `entry` for `symbol`, snapped to its tick size toward the entry
    pub fn levels_for(
        &self,
        symbol: &str,
        side: Side,
        entry: Price,
        quantity: Quantity,
        stop_loss_amount: Option<Decimal>,
        take_profit_amount: Option<Decimal>,
    ) -> CalcResult<ProtectiveLevels> {
        let instrument = self
            .catalog
            .get(symbol)
            .map_err(|_| CalculationError::MissingMultiplier(symbol.to_string()))?;
        let levels = compute(
            side,
            entry,
            quantity,
            instrument.multiplier(),
            stop_loss_amount,
            take_profit_amount,
        )?;
        Ok(levels.rounded_to(instrument, side))
    }

    /// Final levels from an actual fill, snapped to tick
    pub fn levels_for_fill(
        &self,
        fill: &Fill,
        stop_loss_amount: Option<Decimal>,
        take_profit_amount: Option<Decimal>,
    ) -> CalcResult<ProtectiveLevels> {
        self.levels_for(
            &fill.symbol,
            fill.side,
            fill.price,
            fill.quantity,
            stop_loss_amount,
            take_profit_amount,
        )
    }
}

/// Protective levels from a fill's price and side
pub fn compute_from_fill(
    fill: &Fill,
    quantity: Quantity,
    multiplier: Decimal,
    stop_loss_amount: Option<Decimal>,
    take_profit_amount: Option<Decimal>,
) -> CalcResult<ProtectiveLevels> {
    compute(
        fill.side,
        fill.price,
        quantity,
        multiplier,
        stop_loss_amount,
        take_profit_amount,
    )
}

/// Protective levels around an entry price
pub fn compute(
    side: Side,
    entry: Price,
    quantity: Quantity,
    multiplier: Decimal,
    stop_loss_amount: Option<Decimal>,
    take_profit_amount: Option<Decimal>,
) -> CalcResult<ProtectiveLevels> {
    let stop_price = match stop_loss_amount {
        Some(amount) => {
            let distance = price_distance(amount, quantity, multiplier)?;
            let stop = match side {
                Side::Long => entry - distance,
                Side::Short => entry + distance,
            };
            if stop <= Decimal::ZERO {
                return Err(CalculationError::StopBelowZero {
                    stop,
                    fill_price: entry,
                });
            }
            Some(stop)
        }
        None => None,
    };

    let take_profit_price = match take_profit_amount {
        Some(amount) => {
            let distance = price_distance(amount, quantity, multiplier)?;
            let target = match side {
                Side::Long => entry + distance,
                Side::Short => entry - distance,
            };
            if target <= Decimal::ZERO {
                return Err(CalculationError::TargetBelowZero {
                    target,
                    fill_price: entry,
                });
            }
            Some(target)
        }
        None => None,
    };

    Ok(ProtectiveLevels {
        stop_price,
        take_profit_price,
    })
}

/// Price distance that risks `amount` dollars
pub fn price_distance(amount: Decimal, quantity: Quantity, multiplier: Decimal) -> CalcResult<Price> {
    check_inputs(quantity, multiplier)?;
    if amount <= Decimal::ZERO {
        return Err(CalculationError::InvalidAmount(amount));
    }
    Ok(amount / (quantity * multiplier))
}

/// Dollar value of the distance between `price` and `fill_price`
pub fn dollar_amount(
    price: Price,
    fill_price: Price,
    quantity: Quantity,
    multiplier: Decimal,
) -> CalcResult<Decimal> {
    check_inputs(quantity, multiplier)?;
    Ok((price - fill_price).abs() * quantity * multiplier)
}

fn check_inputs(quantity: Quantity, multiplier: Decimal) -> CalcResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(CalculationError::InvalidQuantity(quantity));
    }
    if multiplier <= Decimal::ZERO {
        return Err(CalculationError::InvalidMultiplier {
            symbol: String::new(),
            multiplier,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keel_core::Instrument;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn fill(side: Side, price: Decimal, qty: Decimal) -> Fill {
        Fill::new(Uuid::new_v4(), "NQ", side, price, qty, Utc::now())
    }

    #[test]
    fn test_long_stop_from_dollars() {
        // $200 over 2 contracts × 10 = 10 points
        let levels = compute_from_fill(
            &fill(Side::Long, dec!(15000), dec!(2)),
            dec!(2),
            dec!(10),
            Some(dec!(200)),
            Some(dec!(400)),
        )
        .unwrap();
        assert_eq!(levels.stop_price, Some(dec!(14990)));
        assert_eq!(levels.take_profit_price, Some(dec!(15020)));
    }

    #[test]
    fn test_short_levels_are_mirrored() {
        let levels = compute_from_fill(
            &fill(Side::Short, dec!(15000), dec!(2)),
            dec!(2),
            dec!(10),
            Some(dec!(200)),
            Some(dec!(400)),
        )
        .unwrap();
        assert_eq!(levels.stop_price, Some(dec!(15010)));
        assert_eq!(levels.take_profit_price, Some(dec!(14980)));
    }

    #[test]
    fn test_round_trip_across_multipliers() {
        for multiplier in [dec!(1), dec!(2), dec!(5), dec!(10), dec!(12.5)] {
            let f = fill(Side::Long, dec!(15000), dec!(2));
            let levels =
                compute_from_fill(&f, dec!(2), multiplier, Some(dec!(200)), Some(dec!(350)))
                    .unwrap();

            let stop = levels.stop_price.unwrap();
            let target = levels.take_profit_price.unwrap();
            assert!(stop < f.price && target > f.price);
            assert_eq!(dollar_amount(stop, f.price, dec!(2), multiplier).unwrap(), dec!(200));
            assert_eq!(
                dollar_amount(target, f.price, dec!(2), multiplier).unwrap(),
                dec!(350)
            );
        }
    }

    #[test]
    fn test_invalid_inputs_are_errors() {
        assert_eq!(
            price_distance(dec!(100), dec!(0), dec!(10)),
            Err(CalculationError::InvalidQuantity(dec!(0)))
        );
        assert!(matches!(
            price_distance(dec!(100), dec!(1), dec!(0)),
            Err(CalculationError::InvalidMultiplier { .. })
        ));
        assert_eq!(
            price_distance(dec!(-5), dec!(1), dec!(10)),
            Err(CalculationError::InvalidAmount(dec!(-5)))
        );
    }

    #[test]
    fn test_stop_at_or_below_zero() {
        // 1 contract × 1 multiplier, $50 risk from a $40 entry
        let err = compute(Side::Long, dec!(40), dec!(1), dec!(1), Some(dec!(50)), None).unwrap_err();
        assert!(matches!(err, CalculationError::StopBelowZero { .. }));

        let err = compute(Side::Long, dec!(40), dec!(1), dec!(1), Some(dec!(40)), None).unwrap_err();
        assert!(matches!(err, CalculationError::StopBelowZero { .. }));
    }

    #[test]
    fn test_catalog_lookup_and_tick_rounding() {
        let catalog = InstrumentCatalog::new([
            Instrument::new("ES", dec!(50), dec!(0.25)).unwrap(),
        ])
        .unwrap();
        let calc = SltpCalculator::new(Arc::new(catalog));

        assert_eq!(calc.for_symbol("ES").unwrap(), dec!(50));
        assert_eq!(
            calc.for_symbol("ZZ"),
            Err(CalculationError::MissingMultiplier("ZZ".to_string()))
        );

        // $100 / (3 × 50) = 0.666.. points -> 4999.333.. -> 4999.50
        let levels = calc
            .levels_for("ES", Side::Long, dec!(5000), dec!(3), Some(dec!(100)), None)
            .unwrap();
        assert_eq!(levels.stop_price, Some(dec!(4999.50)));
        assert!(levels.take_profit_price.is_none());
    }

    #[test]
    fn test_tick_rounding_never_widens_risk() {
        let catalog = InstrumentCatalog::new([
            Instrument::new("ES", dec!(50), dec!(0.25)).unwrap(),
        ])
        .unwrap();
        let calc = SltpCalculator::new(Arc::new(catalog));

        for side in [Side::Long, Side::Short] {
            for qty in [dec!(1), dec!(3), dec!(5)] {
                for amount in [dec!(100), dec!(130), dec!(333)] {
                    let levels = calc
                        .levels_for("ES", side, dec!(5000), qty, Some(amount), Some(amount))
                        .unwrap();
                    let stop = levels.stop_price.unwrap();
                    let target = levels.take_profit_price.unwrap();
                    assert!(dollar_amount(stop, dec!(5000), qty, dec!(50)).unwrap() <= amount);
                    assert!(dollar_amount(target, dec!(5000), qty, dec!(50)).unwrap() <= amount);
                    match side {
                        Side::Long => assert!(stop < dec!(5000) && target > dec!(5000)),
                        Side::Short => assert!(stop > dec!(5000) && target < dec!(5000)),
                    }
                }
            }
        }
    }
}
