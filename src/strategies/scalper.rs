//! Momentum-confirmed EMA scalper.
//!
//! Goes long when the fast EMA sits above the slow EMA and short-term
//! momentum points the same way; short on the mirror condition.

use chrono::{DateTime, Utc};

use super::{Strategy, StrategyCore};
use crate::indicators::{IndicatorState, SeriesSpec};
use crate::models::{Direction, TradeSignal};
use crate::trading::config::StrategyParams;

pub struct AggressiveScalper {
    core: StrategyCore,
    ema_fast: String,
    ema_slow: String,
    momentum: String,
}

impl AggressiveScalper {
    pub fn new(params: StrategyParams) -> Self {
        Self {
            ema_fast: SeriesSpec::Ema(params.fast_period).name(),
            ema_slow: SeriesSpec::Ema(params.slow_period).name(),
            momentum: SeriesSpec::Momentum(params.momentum_period).name(),
            core: StrategyCore::new(params),
        }
    }
}

impl Strategy for AggressiveScalper {
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
            SeriesSpec::Momentum(p.momentum_period),
        ]
    }

    fn evaluate(&mut self, state: &IndicatorState, now: DateTime<Utc>) -> Option<TradeSignal> {
        if self.core.on_cooldown(now) {
            return None;
        }

        let fast = state.value(&self.ema_fast)?;
        let slow = state.value(&self.ema_slow)?;
        let momentum = state.value(&self.momentum)?;
        let threshold = self.core.params().entry_threshold;

        if fast > slow && momentum > threshold {
            return Some(self.core.emit(Direction::Long, now));
        }
        if fast < slow && momentum < -threshold {
            return Some(self.core.emit(Direction::Short, now));
        }
        None
    }
}
