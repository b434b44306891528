//! Calculator for session performance: win rate, profit factor, drawdown,
//! Sharpe ratio.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use statrs::statistics::Statistics;

/// Aggregate performance over one bot session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionReport {
    pub trades: u32,
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub total_pnl: Decimal,
    pub avg_win: Decimal,
    pub avg_loss: Decimal,
    pub profit_factor: f64,

    /// Fractional peak-to-trough drop over the sampled equity curve
    pub max_drawdown: f64,

    pub sharpe_ratio: f64,
}

/// Computes a [`SessionReport`] from closed trades and equity samples.
pub struct PerformanceCalculator;

impl PerformanceCalculator {
    /// Build a report from closed-trade P&Ls and sampled equity values.
    pub fn report(pnls: &[Decimal], equity: &[f64]) -> SessionReport {
        let mut report = SessionReport::default();

        if !pnls.is_empty() {
            Self::trade_metrics(&mut report, pnls);
            Self::sharpe(&mut report, pnls);
        }
        report.max_drawdown = Self::max_drawdown(equity);

        report
    }

    fn trade_metrics(report: &mut SessionReport, pnls: &[Decimal]) {
        let (wins, losses): (Vec<_>, Vec<_>) = pnls.iter().partition(|&&p| p >= Decimal::ZERO);

        report.trades = pnls.len() as u32;
        report.wins = wins.len() as u32;
        report.losses = losses.len() as u32;
        report.total_pnl = pnls.iter().copied().sum();
        report.win_rate = wins.len() as f64 / pnls.len() as f64;

        if !wins.is_empty() {
            report.avg_win =
                wins.iter().copied().sum::<Decimal>() / Decimal::from(wins.len() as u32);
        }
        if !losses.is_empty() {
            report.avg_loss = losses.iter().copied().map(|l: Decimal| l.abs()).sum::<Decimal>()
                / Decimal::from(losses.len() as u32);
        }

        let gross_profit: Decimal = wins.iter().copied().sum();
        let gross_loss: Decimal = losses.iter().copied().map(|l: Decimal| l.abs()).sum();
        if gross_loss > Decimal::ZERO {
            report.profit_factor =
                gross_profit.to_f64().unwrap_or(0.0) / gross_loss.to_f64().unwrap_or(1.0);
        }
    }

    /// Peak-to-trough scan over equity samples.
    fn max_drawdown(equity: &[f64]) -> f64 {
        let mut peak = 0.0f64;
        let mut max_dd = 0.0f64;

        for &value in equity {
            if value > peak {
                peak = value;
            }
            if peak > 0.0 {
                let dd = (peak - value) / peak;
                if dd > max_dd {
                    max_dd = dd;
                }
            }
        }
        max_dd
    }

    /// Treats each closed trade as one return sample, annualized over 252
    /// sessions at a zero risk-free rate.
    fn sharpe(report: &mut SessionReport, pnls: &[Decimal]) {
        if pnls.len() < 2 {
            return;
        }

        let returns: Vec<f64> = pnls.iter().filter_map(|p| p.to_f64()).collect();
        if returns.len() < 2 {
            return;
        }

        let mean = returns.clone().mean();
        let std_dev = returns.std_dev();
        if std_dev > 0.0 {
            report.sharpe_ratio = (mean / std_dev) * (252.0_f64).sqrt();
        }
    }
}

impl std::fmt::Display for SessionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n{:=^60}", " SESSION RESULTS ")?;
        writeln!(f)?;
        writeln!(f, "--- Trades ---")?;
        writeln!(f, "Total:       {}", self.trades)?;
        writeln!(f, "Winners:     {} ({:.1}%)", self.wins, self.win_rate * 100.0)?;
        writeln!(f, "Losers:      {}", self.losses)?;
        writeln!(f, "Avg Win:     ${:.2}", self.avg_win)?;
        writeln!(f, "Avg Loss:    ${:.2}", self.avg_loss)?;
        writeln!(f, "Profit Factor: {:.2}", self.profit_factor)?;
        writeln!(f)?;
        writeln!(f, "--- Risk ---")?;
        writeln!(f, "Total P&L:    ${:.2}", self.total_pnl)?;
        writeln!(f, "Max Drawdown: {:.2}%", self.max_drawdown * 100.0)?;
        writeln!(f, "Sharpe Ratio: {:.2}", self.sharpe_ratio)?;
        writeln!(f, "{:=^60}", "")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_trade_metrics() {
        let pnls = vec![dec!(100), dec!(-50), dec!(200), dec!(-30), dec!(150)];
        let report = PerformanceCalculator::report(&pnls, &[]);

        assert_eq!(report.trades, 5);
        assert_eq!(report.wins, 3);
        assert_eq!(report.losses, 2);
        assert_eq!(report.total_pnl, dec!(370));
        assert!((report.win_rate - 0.6).abs() < 0.001);
        assert_eq!(report.avg_win, dec!(150));
        assert_eq!(report.avg_loss, dec!(40));
        // 450 gross profit over 80 gross loss
        assert!((report.profit_factor - 5.625).abs() < 0.001);
    }

    #[test]
    fn test_max_drawdown_over_equity() {
        let equity = vec![10000.0, 10150.0, 10070.0, 10050.0, 10150.0, 10200.0];
        let report = PerformanceCalculator::report(&[], &equity);

        // Trough 10050 against peak 10150
        let expected = (10150.0 - 10050.0) / 10150.0;
        assert!((report.max_drawdown - expected).abs() < 1e-9);
        assert_eq!(report.trades, 0);
    }

    #[test]
    fn test_sharpe_sign_follows_mean() {
        let winners = vec![dec!(10), dec!(12), dec!(9), dec!(11)];
        assert!(PerformanceCalculator::report(&winners, &[]).sharpe_ratio > 0.0);

        let losers = vec![dec!(-10), dec!(-12), dec!(-9), dec!(-11)];
        assert!(PerformanceCalculator::report(&losers, &[]).sharpe_ratio < 0.0);
    }

    #[test]
    fn test_empty_session_is_all_zero() {
        let report = PerformanceCalculator::report(&[], &[]);
        assert_eq!(report.trades, 0);
        assert_eq!(report.total_pnl, Decimal::ZERO);
        assert_eq!(report.max_drawdown, 0.0);
        assert_eq!(report.sharpe_ratio, 0.0);
    }
}
