//! Per-strategy running counters kept by the bot for summaries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Signal and fill counters for one strategy, accumulated over the session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StrategyStats {
    /// Signals the strategy emitted
    pub signals: u64,

    /// Signals that passed the risk gate
    pub admitted: u64,

    /// Signals rejected by the risk gate
    pub rejected: u64,

    /// Orders filled at the terminal
    pub filled: u64,

    /// Orders rejected or failed at the terminal
    pub failed: u64,

    pub wins: u64,
    pub losses: u64,

    /// Realized P&L from closed positions, account currency
    pub realized_pnl: Decimal,

    pub last_signal_at: Option<DateTime<Utc>>,
}

impl StrategyStats {
    /// Fold a closed position's profit into the counters.
    pub fn record_close(&mut self, profit: Decimal) {
        if profit >= Decimal::ZERO {
            self.wins += 1;
        } else {
            self.losses += 1;
        }
        self.realized_pnl += profit;
    }

    pub fn trades(&self) -> u64 {
        self.wins + self.losses
    }

    pub fn win_rate(&self) -> f64 {
        let total = self.trades();
        if total == 0 {
            return 0.0;
        }
        self.wins as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_record_close() {
        let mut stats = StrategyStats::default();
        stats.record_close(dec!(12.50));
        stats.record_close(dec!(-4.00));
        stats.record_close(dec!(3.25));

        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.realized_pnl, dec!(11.75));
        assert!((stats.win_rate() - 2.0 / 3.0).abs() < 1e-12);
    }
}
