//! Types crossing the terminal boundary.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Direction;

/// Account figures as reported by the terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountState {
    pub balance: Decimal,

    /// Balance plus unrealized P&L
    pub equity: Decimal,

    /// Margin locked by open positions
    pub margin: Decimal,

    pub free_margin: Decimal,

    pub currency: String,
}

impl AccountState {
    /// Equity over used margin as a percentage. `None` while nothing
    /// is open.
    pub fn margin_level(&self) -> Option<Decimal> {
        if self.margin <= Decimal::ZERO {
            None
        } else {
            Some(self.equity / self.margin * Decimal::ONE_HUNDRED)
        }
    }
}

/// Market order with mandatory protective levels. Every order the bot
/// sends carries both a stop loss and a take profit; the terminal keeps
/// them server-side.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Bot-side order id, journaled before dispatch
    pub client_id: String,
    pub symbol: String,
    pub direction: Direction,
    pub volume: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    /// Free-form tag; the bot writes the strategy name here
    pub comment: String,
}

/// Outcome of a dispatched order.
#[derive(Debug, Clone)]
pub enum OrderResult {
    Filled { ticket: u64, price: Decimal },
    Rejected { reason: String },
}

/// Errors from the execution side of the terminal.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Automated trading is switched off at the terminal. Distinct from a
    /// risk rejection: the order was never considered.
    #[error("automated trading is disabled at the terminal")]
    ExecutionDisabled,

    #[error("terminal connection error: {0}")]
    Connection(String),
}

/// Errors from the market data side of the terminal.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("feed connection error: {0}")]
    Connection(String),

    /// Replay data ran out; only the paper terminal raises this
    #[error("market data exhausted")]
    Exhausted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_margin_level() {
        let mut account = AccountState {
            balance: dec!(10000),
            equity: dec!(10000),
            margin: Decimal::ZERO,
            free_margin: dec!(10000),
            currency: "USD".to_string(),
        };
        assert_eq!(account.margin_level(), None);

        account.margin = dec!(2500);
        assert_eq!(account.margin_level(), Some(dec!(400)));
    }
}
