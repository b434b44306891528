//! Trade signals emitted by strategy evaluators.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn is_long(&self) -> bool {
        matches!(self, Direction::Long)
    }

    /// +1 for long, -1 for short. Used when signing P&L.
    pub fn sign(&self) -> Decimal {
        match self {
            Direction::Long => Decimal::ONE,
            Direction::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "BUY"),
            Direction::Short => write!(f, "SELL"),
        }
    }
}

/// Candidate trade produced by one strategy in one cycle. Ephemeral: it is
/// either admitted by the risk gate in the same cycle or discarded.
#[derive(Debug, Clone)]
pub struct TradeSignal {
    /// Name of the strategy that emitted it
    pub strategy: String,

    pub direction: Direction,

    /// Stop-loss distance in points, fixed per strategy
    pub stop_points: Decimal,

    /// Take-profit distance in points, fixed per strategy
    pub target_points: Decimal,

    /// Server time the signal was generated
    pub generated_at: DateTime<Utc>,
}
