//! Data models for market data, signals, positions, and statistics.

mod market;
mod position;
mod signal;
mod stats;

pub use market::{Bar, MarketSnapshot, Quote, SymbolSpec};
pub use position::{ClosedPosition, CloseReason, PositionRecord};
pub use signal::{Direction, TradeSignal};
pub use stats::StrategyStats;
