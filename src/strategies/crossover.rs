//! EMA crossover trend follower with cycle confirmation.
//!
//! A cross starts a confirmation count. The count grows while the EMAs
//! stay aligned with the crossing direction and resets if they flip back;
//! only once it reaches `confirm_cycles` does the strategy enter. A
//! confirmed cross that lands inside the cooldown window is consumed, not
//! deferred.

use chrono::{DateTime, Utc};

use super::{Strategy, StrategyCore};
use crate::indicators::{IndicatorState, SeriesSpec};
use crate::models::{Direction, TradeSignal};
use crate::trading::config::StrategyParams;

pub struct TrendCrossover {
    core: StrategyCore,
    ema_fast: String,
    ema_slow: String,
    /// Direction of the unconfirmed cross and how many aligned cycles it
    /// has survived
    pending: Option<(Direction, u32)>,
}

impl TrendCrossover {
    pub fn new(params: StrategyParams) -> Self {
        Self {
            ema_fast: SeriesSpec::Ema(params.fast_period).name(),
            ema_slow: SeriesSpec::Ema(params.slow_period).name(),
            core: StrategyCore::new(params),
            pending: None,
        }
    }
}

impl Strategy for TrendCrossover {
    fn name(&self) -> &str {
        &self.core.params().name
    }

    fn params(&self) -> &StrategyParams {
        self.core.params()
    }

    fn series(&self) -> Vec<SeriesSpec> {
        let p = self.core.params();
        vec![
            SeriesSpec::Ema(p.fast_period),
            SeriesSpec::Ema(p.slow_period),
        ]
    }

    fn evaluate(&mut self, state: &IndicatorState, now: DateTime<Utc>) -> Option<TradeSignal> {
        let fast = state.value(&self.ema_fast)?;
        let slow = state.value(&self.ema_slow)?;

        // Confirmation tracking runs every cycle, cooldown or not
        if state.crossed_above(&self.ema_fast, &self.ema_slow) {
            self.pending = Some((Direction::Long, 1));
        } else if state.crossed_below(&self.ema_fast, &self.ema_slow) {
            self.pending = Some((Direction::Short, 1));
        } else if let Some((direction, count)) = self.pending {
            let aligned = match direction {
                Direction::Long => fast > slow,
                Direction::Short => fast < slow,
            };
            self.pending = if aligned {
                Some((direction, count + 1))
            } else {
                None
            };
        }

        let (direction, count) = self.pending?;
        if count < self.core.params().confirm_cycles {
            return None;
        }

        self.pending = None;
        if self.core.on_cooldown(now) {
            return None;
        }
        Some(self.core.emit(direction, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trading::config::TradingConfig;

    fn crossover() -> TrendCrossover {
        let params = TradingConfig::conservative()
            .strategy("trend_crossover")
            .unwrap()
            .clone();
        TrendCrossover::new(params)
    }

    fn state(fast: Vec<f64>, slow: Vec<f64>) -> IndicatorState {
        IndicatorState::synthetic(Utc::now(), vec![("ema_8", fast), ("ema_21", slow)])
    }

    #[test]
    fn test_cross_needs_confirmation_cycles() {
        // conservative preset confirms over 2 cycles
        let mut s = crossover();
        let now = Utc::now();

        // Cycle 1: the fast EMA crosses above
        let crossed = state(vec![99.0, 101.0], vec![100.0, 100.0]);
        assert!(s.evaluate(&crossed, now).is_none());

        // Cycle 2: still aligned, confirmed, enter long
        let aligned = state(vec![101.0, 102.0], vec![100.0, 100.1]);
        let signal = s.evaluate(&aligned, now).unwrap();
        assert_eq!(signal.direction, Direction::Long);
    }

    #[test]
    fn test_flip_back_clears_confirmation() {
        let mut s = crossover();
        let now = Utc::now();

        let crossed = state(vec![99.0, 101.0], vec![100.0, 100.0]);
        assert!(s.evaluate(&crossed, now).is_none());

        // Fast EMA drops back below before confirmation completes
        let flipped = state(vec![101.0, 99.5], vec![100.0, 100.0]);
        assert!(s.evaluate(&flipped, now).is_none());

        // Staying aligned afterwards does not resurrect the old cross
        let aligned_again = state(vec![99.5, 99.0], vec![100.0, 100.0]);
        assert!(s.evaluate(&aligned_again, now).is_none());
    }

    #[test]
    fn test_downward_cross_goes_short() {
        let mut s = crossover();
        let now = Utc::now();

        let crossed = state(vec![101.0, 99.0], vec![100.0, 100.0]);
        assert!(s.evaluate(&crossed, now).is_none());

        let aligned = state(vec![99.0, 98.5], vec![100.0, 100.0]);
        let signal = s.evaluate(&aligned, now).unwrap();
        assert_eq!(signal.direction, Direction::Short);
    }

    #[test]
    fn test_confirmed_cross_inside_cooldown_is_consumed() {
        let mut s = crossover();
        let now = Utc::now();

        // First confirmed cross emits and starts the 10s cooldown
        let crossed = state(vec![99.0, 101.0], vec![100.0, 100.0]);
        s.evaluate(&crossed, now);
        let aligned = state(vec![101.0, 102.0], vec![100.0, 100.1]);
        assert!(s.evaluate(&aligned, now).is_some());

        // A fresh cross confirms inside the window and is dropped
        let crossed_down = state(vec![101.0, 99.0], vec![100.0, 100.0]);
        s.evaluate(&crossed_down, now);
        let aligned_down = state(vec![99.0, 98.0], vec![100.0, 100.0]);
        assert!(s.evaluate(&aligned_down, now).is_none());

        // Alignment alone after the window does not re-trigger it
        let later = now + chrono::Duration::milliseconds(10_001);
        assert!(s.evaluate(&aligned_down, later).is_none());
    }
}
