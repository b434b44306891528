//! Position models for open trades and their terminal (closed) records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::market::SymbolSpec;
use super::signal::Direction;

/// An open position held at the trade terminal.
///
/// The terminal is the source of truth for tickets and prices; the risk
/// ledger annotates each position with the risk fraction reserved for it.
/// Positions discovered at the terminal that the bot did not open carry a
/// zero `risk_fraction`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Terminal-assigned ticket number
    pub ticket: u64,

    /// Name of the strategy that opened it (empty for foreign positions)
    pub strategy: String,

    pub direction: Direction,

    /// Volume in lots
    pub volume: Decimal,

    /// Fill price
    pub entry_price: Decimal,

    /// Broker-resident stop loss price
    pub stop_loss: Decimal,

    /// Broker-resident take profit price
    pub take_profit: Decimal,

    /// Fraction of the day-start balance reserved against this position
    pub risk_fraction: Decimal,

    pub opened_at: DateTime<Utc>,
}

impl PositionRecord {
    /// P&L at the given price, in account currency.
    ///
    /// One point of favorable movement on one lot is worth `tick_value`.
    pub fn pnl_at(&self, price: Decimal, spec: &SymbolSpec) -> Decimal {
        let points = (price - self.entry_price) / spec.point;
        points * spec.tick_value * self.volume * self.direction.sign()
    }
}

/// Why a position left the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    StopLoss,
    TakeProfit,
    /// Closed by the bot (circuit breaker flatten or shutdown)
    Flatten,
    Manual,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::StopLoss => "stop_loss",
            CloseReason::TakeProfit => "take_profit",
            CloseReason::Flatten => "flatten",
            CloseReason::Manual => "manual",
        }
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A position after it has been closed at the terminal.
#[derive(Debug, Clone)]
pub struct ClosedPosition {
    pub position: PositionRecord,
    pub close_price: Decimal,

    /// Realized P&L in account currency
    pub profit: Decimal,

    pub closed_at: DateTime<Utc>,
    pub reason: CloseReason,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn gold_spec() -> SymbolSpec {
        SymbolSpec {
            symbol: "XAUUSD".to_string(),
            point: dec!(0.01),
            tick_value: dec!(0.01),
            volume_step: dec!(0.01),
            volume_min: dec!(0.01),
            volume_max: dec!(100),
            margin_per_lot: dec!(2400),
        }
    }

    fn long_position() -> PositionRecord {
        PositionRecord {
            ticket: 1001,
            strategy: "aggressive_scalp".to_string(),
            direction: Direction::Long,
            volume: dec!(0.5),
            entry_price: dec!(2400.00),
            stop_loss: dec!(2399.60),
            take_profit: dec!(2400.60),
            risk_fraction: dec!(0.003),
            opened_at: Utc::now(),
        }
    }

    #[test]
    fn test_long_pnl() {
        let pos = long_position();
        let spec = gold_spec();

        // 100 points up at 0.01/point/lot on 0.5 lots
        assert_eq!(pos.pnl_at(dec!(2401.00), &spec), dec!(0.50));
        // Losing side
        assert_eq!(pos.pnl_at(dec!(2399.00), &spec), dec!(-0.50));
    }

    #[test]
    fn test_short_pnl_is_inverted() {
        let mut pos = long_position();
        pos.direction = Direction::Short;
        let spec = gold_spec();

        assert_eq!(pos.pnl_at(dec!(2399.00), &spec), dec!(0.50));
        assert_eq!(pos.pnl_at(dec!(2401.00), &spec), dec!(-0.50));
    }
}
