//! Market data values: bars, quotes, per-cycle snapshots and instrument specs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One OHLC bar. Prices are plain floats because bars only feed
/// indicator math, never order placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time (broker server time)
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Current top-of-book quote. Decimal because orders price off it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Quote time (broker server time)
    pub time: DateTime<Utc>,
    pub bid: Decimal,
    pub ask: Decimal,
}

impl Quote {
    pub fn mid(&self) -> Decimal {
        (self.bid + self.ask) / Decimal::TWO
    }

    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }
}

/// Immutable market view for one decision cycle: the latest quote plus
/// enough bar history for the longest configured lookback. Owned by the
/// cycle and discarded once indicators are derived.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub quote: Quote,
    /// Oldest first; the last bar is the current (possibly forming) one.
    pub bars: Vec<Bar>,
}

impl MarketSnapshot {
    /// Broker server time of this snapshot. Day boundaries and cooldowns
    /// are measured against this, not local wall time.
    pub fn server_time(&self) -> DateTime<Utc> {
        self.quote.time
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }
}

/// Instrument quoting and contract parameters, as reported by the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolSpec {
    pub symbol: String,

    /// Smallest quoted price increment (e.g. 0.01 for gold)
    pub point: Decimal,

    /// Account-currency value of a one-point move per 1.0 lot
    pub tick_value: Decimal,

    /// Volume granularity (lot step)
    pub volume_step: Decimal,

    /// Smallest order the broker accepts
    pub volume_min: Decimal,

    /// Largest order the broker accepts
    pub volume_max: Decimal,

    /// Margin required to hold 1.0 lot
    pub margin_per_lot: Decimal,
}

impl SymbolSpec {
    /// Convert a distance in points to a price offset.
    pub fn points_to_price(&self, points: Decimal) -> Decimal {
        points * self.point
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_mid_and_spread() {
        let q = Quote {
            time: Utc::now(),
            bid: dec!(2400.10),
            ask: dec!(2400.30),
        };
        assert_eq!(q.mid(), dec!(2400.20));
        assert_eq!(q.spread(), dec!(0.20));
    }

    #[test]
    fn test_points_to_price() {
        let spec = SymbolSpec {
            symbol: "XAUUSD".to_string(),
            point: dec!(0.01),
            tick_value: dec!(1),
            volume_step: dec!(0.01),
            volume_min: dec!(0.01),
            volume_max: dec!(100),
            margin_per_lot: dec!(2400),
        };
        assert_eq!(spec.points_to_price(dec!(10)), dec!(0.10));
    }
}
