//! Trade terminal boundary: market data on one side, order execution on
//! the other.
//!
//! The bot only ever talks to these two traits. The in-repo implementation
//! is [`PaperTerminal`], which replays a bar tape and simulates fills; a
//! live adapter implements the same pair against a real terminal bridge.

mod paper;
mod types;

pub use paper::{PaperConfig, PaperTerminal};
pub use types::{AccountState, BrokerError, FeedError, OrderRequest, OrderResult};

use async_trait::async_trait;

use crate::models::{ClosedPosition, MarketSnapshot, PositionRecord, SymbolSpec};

/// Market data side of the terminal.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Latest quote plus the trailing `lookback` bars for one symbol.
    async fn snapshot(&self, symbol: &str, lookback: usize)
        -> Result<MarketSnapshot, FeedError>;
}

/// Execution side of the terminal.
#[async_trait]
pub trait Broker: Send + Sync {
    async fn account(&self) -> Result<AccountState, BrokerError>;

    async fn symbol_spec(&self, symbol: &str) -> Result<SymbolSpec, BrokerError>;

    /// Whether the terminal currently accepts automated orders.
    async fn trading_permitted(&self) -> Result<bool, BrokerError>;

    async fn submit(&self, request: &OrderRequest) -> Result<OrderResult, BrokerError>;

    async fn open_positions(&self) -> Result<Vec<PositionRecord>, BrokerError>;

    /// Close one open position at market.
    async fn close(&self, ticket: u64) -> Result<(), BrokerError>;

    /// Positions closed since the last drain, whether by stop, target,
    /// or an explicit close call.
    async fn drain_closed(&self) -> Result<Vec<ClosedPosition>, BrokerError>;
}
