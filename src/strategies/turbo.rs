//! Tick-to-tick scalper over very short EMAs.
//!
//! Built for the high-frequency cadence: enters on a single-tick price
//! push that agrees with the short EMA pair. The delta threshold is tiny
//! and the cooldown short or zero.

use chrono::{DateTime, Utc};

use super::{Strategy, StrategyCore};
use crate::indicators::{IndicatorState, SeriesSpec};
use crate::models::{Direction, TradeSignal};
use crate::trading::config::StrategyParams;

pub struct TurboScalper {
    core: StrategyCore,
    ema_fast: String,
    ema_slow: String,
}

impl TurboScalper {
    pub fn new(params: StrategyParams) -> Self {
        Self {
            ema_fast: SeriesSpec::Ema(params.fast_period).name(),
            ema_slow: SeriesSpec::Ema(params.slow_period).name(),
            core: StrategyCore::new(params),
        }
    }
}

impl Strategy for TurboScalper {
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
        if self.core.on_cooldown(now) {
            return None;
        }

        let fast = state.value(&self.ema_fast)?;
        let slow = state.value(&self.ema_slow)?;
        let close = state.value("close")?;
        let previous = state.previous("close")?;
        if previous == 0.0 {
            return None;
        }

        let delta = (close - previous) / previous;
        let threshold = self.core.params().entry_threshold;

        if fast > slow && delta >= threshold {
            return Some(self.core.emit(Direction::Long, now));
        }
        if fast < slow && delta <= -threshold {
            return Some(self.core.emit(Direction::Short, now));
        }
        None
    }
}
