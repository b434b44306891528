//! Trading logic: configuration, risk accounting, and position sizing.

pub mod config;
mod risk;
mod sizer;

pub use config::{ConfigError, RiskLimits, StrategyKind, StrategyParams, TradingConfig};
pub use risk::{
    BreakerState, BreakerTrip, CircuitBreaker, RejectReason, RiskGate, RiskLedger, RiskReservation,
};
pub use sizer::{PositionSizer, SizingError};
