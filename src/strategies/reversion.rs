//! Bollinger band mean reversion with RSI confirmation.
//!
//! Fades moves that push the close outside the bands while RSI agrees the
//! market is stretched: long below the lower band when oversold, short
//! above the upper band when overbought.

use chrono::{DateTime, Utc};

use super::{Strategy, StrategyCore};
use crate::indicators::{IndicatorState, SeriesSpec};
use crate::models::{Direction, TradeSignal};
use crate::trading::config::StrategyParams;

pub struct MeanReversion {
    core: StrategyCore,
    band_upper: String,
    band_lower: String,
    rsi: String,
}

impl MeanReversion {
    pub fn new(params: StrategyParams) -> Self {
        Self {
            band_upper: SeriesSpec::BandUpper(params.slow_period, params.band_mult).name(),
            band_lower: SeriesSpec::BandLower(params.slow_period, params.band_mult).name(),
            rsi: SeriesSpec::Rsi(params.fast_period).name(),
            core: StrategyCore::new(params),
        }
    }
}

impl Strategy for MeanReversion {
    fn name(&self) -> &str {
        &self.core.params().name
    }

    fn params(&self) -> &StrategyParams {
        self.core.params()
    }

    fn series(&self) -> Vec<SeriesSpec> {
        let p = self.core.params();
        vec![
            SeriesSpec::BandUpper(p.slow_period, p.band_mult),
            SeriesSpec::BandLower(p.slow_period, p.band_mult),
            SeriesSpec::Rsi(p.fast_period),
        ]
    }

    fn evaluate(&mut self, state: &IndicatorState, now: DateTime<Utc>) -> Option<TradeSignal> {
        if self.core.on_cooldown(now) {
            return None;
        }

        let close = state.value("close")?;
        let lower = state.value(&self.band_lower)?;
        let upper = state.value(&self.band_upper)?;
        let rsi = state.value(&self.rsi)?;
        let p = self.core.params();

        if close < lower && rsi < p.oversold {
            return Some(self.core.emit(Direction::Long, now));
        }
        if close > upper && rsi > p.overbought {
            return Some(self.core.emit(Direction::Short, now));
        }
        None
    }
}
