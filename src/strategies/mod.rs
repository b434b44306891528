//! Strategy evaluators.
//!
//! Each evaluator reads the shared [`IndicatorState`] for the cycle and may
//! emit at most one [`TradeSignal`]. Evaluators never touch the ledger or
//! the terminal; admission, sizing, and dispatch all happen downstream.
//! Evaluation is pure over its inputs apart from the cooldown clock and,
//! for the crossover variant, its confirmation counter.

mod breakout;
mod crossover;
mod reversion;
mod scalper;
mod turbo;

pub use breakout::MomentumBreakout;
pub use crossover::TrendCrossover;
pub use reversion::MeanReversion;
pub use scalper::AggressiveScalper;
pub use turbo::TurboScalper;

use chrono::{DateTime, Duration, Utc};

use crate::indicators::{IndicatorState, SeriesSpec};
use crate::models::{Direction, TradeSignal};
use crate::trading::config::{StrategyKind, StrategyParams};

/// One strategy evaluator behind the common evaluation contract.
pub trait Strategy: Send {
    /// Unique name from the config block.
    fn name(&self) -> &str;

    fn params(&self) -> &StrategyParams;

    /// Indicator series this evaluator needs computed each cycle.
    fn series(&self) -> Vec<SeriesSpec>;

    /// Evaluate one cycle. Identical state and clock always produce the
    /// identical signal, or the identical absence of one.
    fn evaluate(&mut self, state: &IndicatorState, now: DateTime<Utc>) -> Option<TradeSignal>;
}

/// Cooldown tracking and signal assembly shared by every evaluator.
pub(crate) struct StrategyCore {
    params: StrategyParams,
    last_signal_at: Option<DateTime<Utc>>,
}

impl StrategyCore {
    pub(crate) fn new(params: StrategyParams) -> Self {
        Self {
            params,
            last_signal_at: None,
        }
    }

    pub(crate) fn params(&self) -> &StrategyParams {
        &self.params
    }

    /// True while the window from the last emitted signal is still open.
    pub(crate) fn on_cooldown(&self, now: DateTime<Utc>) -> bool {
        match self.last_signal_at {
            Some(last) => now - last < Duration::milliseconds(self.params.cooldown_ms as i64),
            None => false,
        }
    }

    /// Stamp the cooldown clock and assemble the signal.
    pub(crate) fn emit(&mut self, direction: Direction, now: DateTime<Utc>) -> TradeSignal {
        self.last_signal_at = Some(now);
        TradeSignal {
            strategy: self.params.name.clone(),
            direction,
            stop_points: self.params.stop_points,
            target_points: self.params.target_points,
            generated_at: now,
        }
    }
}

/// Instantiate one evaluator from its config block.
pub fn build(params: StrategyParams) -> Box<dyn Strategy> {
    match params.kind {
        StrategyKind::AggressiveScalp => Box::new(AggressiveScalper::new(params)),
        StrategyKind::MomentumBreakout => Box::new(MomentumBreakout::new(params)),
        StrategyKind::TrendCrossover => Box::new(TrendCrossover::new(params)),
        StrategyKind::MeanReversion => Box::new(MeanReversion::new(params)),
        StrategyKind::TurboScalp => Box::new(TurboScalper::new(params)),
    }
}

/// Instantiate the whole roster. Order is preserved: it is the priority
/// order signals are gated in.
pub fn build_all(blocks: &[StrategyParams]) -> Vec<Box<dyn Strategy>> {
    blocks.iter().map(|params| build(params.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::config::TradingConfig;

    #[test]
    fn test_roster_preserves_declaration_order() {
        let config = TradingConfig::conservative();
        let roster = build_all(&config.strategies);

        let names: Vec<&str> = roster.iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "trend_crossover",
                "aggressive_scalp",
                "momentum_breakout",
                "mean_reversion",
                "turbo_scalp"
            ]
        );
    }

    #[test]
    fn test_rosters_series_union_is_computable() {
        let config = TradingConfig::conservative();
        let roster = build_all(&config.strategies);

        let specs: Vec<SeriesSpec> = roster.iter().flat_map(|s| s.series()).collect();
        let cache = crate::indicators::IndicatorCache::new(specs);
        assert!(cache.min_bars() <= config.lookback_bars);
    }
}
