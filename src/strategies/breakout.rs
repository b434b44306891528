//! Rate-of-change breakout rider with a volatility floor.
//!
//! Enters in the direction of a sharp move once the fractional rate of
//! change clears the entry threshold, but only while ATR relative to price
//! shows the market is actually moving.

use chrono::{DateTime, Utc};

use super::{Strategy, StrategyCore};
use crate::indicators::{IndicatorState, SeriesSpec};
use crate::models::{Direction, TradeSignal};
use crate::trading::config::StrategyParams;

pub struct MomentumBreakout {
    core: StrategyCore,
    momentum: String,
    atr: String,
}

impl MomentumBreakout {
    pub fn new(params: StrategyParams) -> Self {
        Self {
            momentum: SeriesSpec::Momentum(params.momentum_period).name(),
            atr: SeriesSpec::Atr(params.fast_period).name(),
            core: StrategyCore::new(params),
        }
    }
}

impl Strategy for MomentumBreakout {
    fn name(&self) -> &str {
        &self.core.params().name
    }

    fn params(&self) -> &StrategyParams {
        self.core.params()
    }

    fn series(&self) -> Vec<SeriesSpec> {
        let p = self.core.params();
        vec![
            SeriesSpec::Momentum(p.momentum_period),
            SeriesSpec::Atr(p.fast_period),
        ]
    }

    fn evaluate(&mut self, state: &IndicatorState, now: DateTime<Utc>) -> Option<TradeSignal> {
        if self.core.on_cooldown(now) {
            return None;
        }

        let p = self.core.params();
        if p.min_atr > 0.0 {
            let atr = state.value(&self.atr)?;
            let close = state.value("close")?;
            if close <= 0.0 || atr / close < p.min_atr {
                return None;
            }
        }

        let roc = state.value(&self.momentum)?;
        if roc > p.entry_threshold {
            return Some(self.core.emit(Direction::Long, now));
        }
        if roc < -p.entry_threshold {
            return Some(self.core.emit(Direction::Short, now));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::config::TradingConfig;

    fn breakout() -> MomentumBreakout {
        let params = TradingConfig::conservative()
            .strategy("momentum_breakout")
            .unwrap()
            .clone();
        MomentumBreakout::new(params)
    }

    fn state(roc: f64, atr: f64, close: f64) -> IndicatorState {
        IndicatorState::synthetic(
            Utc::now(),
            vec![
                ("mom_5", vec![roc]),
                ("atr_9", vec![atr]),
                ("close", vec![close]),
            ],
        )
    }

    #[test]
    fn test_breakout_long_above_threshold() {
        // Threshold 0.003, min_atr 0.0005: ATR 2.0 on a 2400 close passes
        let mut s = breakout();
        let signal = s.evaluate(&state(0.004, 2.0, 2400.0), Utc::now()).unwrap();
        assert_eq!(signal.direction, Direction::Long);
    }

    #[test]
    fn test_breakout_short_below_negative_threshold() {
        let mut s = breakout();
        let signal = s.evaluate(&state(-0.004, 2.0, 2400.0), Utc::now()).unwrap();
        assert_eq!(signal.direction, Direction::Short);
    }

    #[test]
    fn test_small_move_is_ignored() {
        let mut s = breakout();
        assert!(s.evaluate(&state(0.002, 2.0, 2400.0), Utc::now()).is_none());
        assert!(s.evaluate(&state(-0.002, 2.0, 2400.0), Utc::now()).is_none());
    }

    #[test]
    fn test_dead_market_filtered_by_atr() {
        // ATR 0.6 over 2400 is 0.00025, below the 0.0005 floor
        let mut s = breakout();
        assert!(s.evaluate(&state(0.004, 0.6, 2400.0), Utc::now()).is_none());
    }
}
