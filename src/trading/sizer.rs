//! Risk-based position sizing.
//!
//! Volume is derived from the account balance and the strategy's risk
//! fraction so that hitting the stop loses exactly the risked amount:
//!
//!   volume = (balance * risk_per_trade) / (stop_points * tick_value)
//!
//! The result is capped, then floored to the symbol's volume step so the
//! realized risk never exceeds the intended fraction.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::SymbolSpec;

/// Errors from volume computation.
#[derive(Error, Debug, PartialEq)]
pub enum SizingError {
    #[error("stop distance must be positive, got {0}")]
    ZeroStopDistance(Decimal),

    #[error("risk amount {risk_amount} maps to less than the minimum volume")]
    VolumeTooSmall { risk_amount: Decimal },
}

/// Converts a risk fraction into an order volume for one symbol.
#[derive(Debug, Clone)]
pub struct PositionSizer {
    /// Account-level per-order cap in lots
    max_volume: Decimal,
}

impl PositionSizer {
    pub fn new(max_volume: Decimal) -> Self {
        Self { max_volume }
    }

    /// Size an order so the stop-out loss equals `balance * risk_per_trade`.
    pub fn size(
        &self,
        balance: Decimal,
        risk_per_trade: Decimal,
        stop_points: Decimal,
        spec: &SymbolSpec,
    ) -> Result<Decimal, SizingError> {
        if stop_points <= Decimal::ZERO {
            return Err(SizingError::ZeroStopDistance(stop_points));
        }

        let loss_per_lot = stop_points * spec.tick_value;
        if loss_per_lot <= Decimal::ZERO {
            // A spec without a tick value cannot price the stop
            return Err(SizingError::ZeroStopDistance(stop_points));
        }

        let risk_amount = balance * risk_per_trade;
        let raw = risk_amount / loss_per_lot;
        let capped = raw.min(self.max_volume).min(spec.volume_max);
        let floored = (capped / spec.volume_step).floor() * spec.volume_step;

        if floored <= Decimal::ZERO || floored < spec.volume_min {
            return Err(SizingError::VolumeTooSmall { risk_amount });
        }
        Ok(floored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn spec() -> SymbolSpec {
        SymbolSpec {
            symbol: "XAUUSD".to_string(),
            point: dec!(0.01),
            tick_value: dec!(1),
            volume_step: dec!(0.01),
            volume_min: dec!(0.01),
            volume_max: dec!(100),
            margin_per_lot: dec!(2400),
        }
    }

    #[test]
    fn test_textbook_sizing() {
        // $10,000 at 0.5% risk with a 10 point stop worth $1/point/lot:
        // $50 of risk over $10 per lot is exactly 5 lots
        let sizer = PositionSizer::new(dec!(10));
        let volume = sizer
            .size(dec!(10000), dec!(0.005), dec!(10), &spec())
            .unwrap();
        assert_eq!(volume, dec!(5));
    }

    #[test]
    fn test_volume_is_capped() {
        let sizer = PositionSizer::new(dec!(10));
        let volume = sizer
            .size(dec!(1000000), dec!(0.01), dec!(10), &spec())
            .unwrap();
        assert_eq!(volume, dec!(10));
    }

    #[test]
    fn test_symbol_max_caps_too() {
        let mut s = spec();
        s.volume_max = dec!(3);
        let sizer = PositionSizer::new(dec!(10));
        let volume = sizer.size(dec!(100000), dec!(0.01), dec!(10), &s).unwrap();
        assert_eq!(volume, dec!(3));
    }

    #[test]
    fn test_floors_to_volume_step() {
        let mut s = spec();
        s.volume_step = dec!(0.5);
        let sizer = PositionSizer::new(dec!(10));
        // Raw volume 3.7 floors to 3.5, never rounds up
        let volume = sizer.size(dec!(10000), dec!(0.0037), dec!(10), &s).unwrap();
        assert_eq!(volume, dec!(3.5));
    }

    #[test]
    fn test_zero_stop_is_rejected() {
        let sizer = PositionSizer::new(dec!(10));
        let err = sizer
            .size(dec!(10000), dec!(0.005), dec!(0), &spec())
            .unwrap_err();
        assert_eq!(err, SizingError::ZeroStopDistance(dec!(0)));
    }

    #[test]
    fn test_dust_balance_is_rejected() {
        let sizer = PositionSizer::new(dec!(10));
        let err = sizer
            .size(dec!(10), dec!(0.005), dec!(10), &spec())
            .unwrap_err();
        assert!(matches!(err, SizingError::VolumeTooSmall { .. }));
    }
}
