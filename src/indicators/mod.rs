//! Technical indicator series and the per-tick cache shared by all strategies.
//!
//! Every strategy declares the series it evaluates as [`SeriesSpec`] values.
//! The cache takes the union of those declarations, computes each distinct
//! series once per snapshot, and hands the strategies an [`IndicatorState`]
//! with the trailing window of every series.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::{Bar, MarketSnapshot};

/// Trailing values of each series kept in the state for lookbacks and
/// cross detection.
pub const HISTORY_LEN: usize = 8;

/// Errors from indicator computation.
#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("not enough history: need {required} bars, have {available}")]
    InsufficientHistory { required: usize, available: usize },
}

/// One indicator series a strategy wants computed, keyed by kind and period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeriesSpec {
    Ema(usize),
    Sma(usize),
    Rsi(usize),
    /// Fractional rate of change over the period
    Momentum(usize),
    Atr(usize),
    /// Bollinger upper band: SMA + mult * population stddev
    BandUpper(usize, f64),
    /// Bollinger lower band: SMA - mult * population stddev
    BandLower(usize, f64),
}

impl SeriesSpec {
    /// Stable key used for deduplication and lookups in [`IndicatorState`].
    pub fn name(&self) -> String {
        match self {
            SeriesSpec::Ema(p) => format!("ema_{p}"),
            SeriesSpec::Sma(p) => format!("sma_{p}"),
            SeriesSpec::Rsi(p) => format!("rsi_{p}"),
            SeriesSpec::Momentum(p) => format!("mom_{p}"),
            SeriesSpec::Atr(p) => format!("atr_{p}"),
            SeriesSpec::BandUpper(p, m) => format!("band_upper_{p}_{m}"),
            SeriesSpec::BandLower(p, m) => format!("band_lower_{p}_{m}"),
        }
    }

    /// Bars needed before the series produces its first defined value.
    pub fn required_bars(&self) -> usize {
        match self {
            SeriesSpec::Ema(p) | SeriesSpec::Sma(p) | SeriesSpec::Atr(p) => *p,
            SeriesSpec::Rsi(p) | SeriesSpec::Momentum(p) => p + 1,
            SeriesSpec::BandUpper(p, _) | SeriesSpec::BandLower(p, _) => *p,
        }
    }
}

/// Snapshot of all computed series at one tick.
///
/// Undefined values (warm-up NaNs, zero divisors) surface as `None` so that
/// strategy predicates short-circuit instead of comparing against NaN.
#[derive(Debug, Clone)]
pub struct IndicatorState {
    /// Server time of the snapshot the values were computed from
    pub timestamp: DateTime<Utc>,
    series: HashMap<String, Vec<f64>>,
}

impl IndicatorState {
    /// Latest value of a series.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.back(name, 0)
    }

    /// Value one tick before the latest.
    pub fn previous(&self, name: &str) -> Option<f64> {
        self.back(name, 1)
    }

    /// Value `offset` ticks before the latest.
    pub fn back(&self, name: &str, offset: usize) -> Option<f64> {
        let values = self.series.get(name)?;
        if offset >= values.len() {
            return None;
        }
        let v = values[values.len() - 1 - offset];
        if v.is_nan() {
            None
        } else {
            Some(v)
        }
    }

    /// True when `fast` closed at or below `slow` on the previous tick and
    /// strictly above it on this one.
    pub fn crossed_above(&self, fast: &str, slow: &str) -> bool {
        match (
            self.previous(fast),
            self.previous(slow),
            self.value(fast),
            self.value(slow),
        ) {
            (Some(pf), Some(ps), Some(f), Some(s)) => pf <= ps && f > s,
            _ => false,
        }
    }

    /// Mirror of [`crossed_above`](Self::crossed_above).
    pub fn crossed_below(&self, fast: &str, slow: &str) -> bool {
        match (
            self.previous(fast),
            self.previous(slow),
            self.value(fast),
            self.value(slow),
        ) {
            (Some(pf), Some(ps), Some(f), Some(s)) => pf >= ps && f < s,
            _ => false,
        }
    }
}

#[cfg(test)]
impl IndicatorState {
    /// Hand-built state for evaluator tests.
    pub(crate) fn synthetic(timestamp: DateTime<Utc>, series: Vec<(&str, Vec<f64>)>) -> Self {
        Self {
            timestamp,
            series: series
                .into_iter()
                .map(|(name, values)| (name.to_string(), values))
                .collect(),
        }
    }
}

/// Computes the union of all requested series once per snapshot.
pub struct IndicatorCache {
    specs: Vec<SeriesSpec>,
    min_bars: usize,
}

impl IndicatorCache {
    /// Build a cache over the given specs, deduplicated by name in
    /// first-seen order.
    pub fn new(requested: Vec<SeriesSpec>) -> Self {
        let mut specs: Vec<SeriesSpec> = Vec::new();
        let mut seen = HashSet::new();
        for spec in requested {
            if seen.insert(spec.name()) {
                specs.push(spec);
            }
        }

        let warmup = specs.iter().map(|s| s.required_bars()).max().unwrap_or(1);
        Self {
            min_bars: warmup + HISTORY_LEN,
            specs,
        }
    }

    /// Minimum bars a snapshot must carry before every series is defined
    /// across the full trailing window.
    pub fn min_bars(&self) -> usize {
        self.min_bars
    }

    /// Compute all series from the snapshot's bars.
    pub fn update(&self, snapshot: &MarketSnapshot) -> Result<IndicatorState, IndicatorError> {
        let bars = &snapshot.bars;
        if bars.len() < self.min_bars {
            return Err(IndicatorError::InsufficientHistory {
                required: self.min_bars,
                available: bars.len(),
            });
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let mut series = HashMap::with_capacity(self.specs.len() + 1);
        series.insert("close".to_string(), tail(&closes));

        for spec in &self.specs {
            let full = match spec {
                SeriesSpec::Ema(p) => ema(&closes, *p),
                SeriesSpec::Sma(p) => sma(&closes, *p),
                SeriesSpec::Rsi(p) => rsi(&closes, *p),
                SeriesSpec::Momentum(p) => momentum(&closes, *p),
                SeriesSpec::Atr(p) => atr(bars, *p),
                SeriesSpec::BandUpper(p, m) => bollinger(&closes, *p, *m).0,
                SeriesSpec::BandLower(p, m) => bollinger(&closes, *p, *m).1,
            };
            series.insert(spec.name(), tail(&full));
        }

        Ok(IndicatorState {
            timestamp: snapshot.quote.time,
            series,
        })
    }
}

fn tail(values: &[f64]) -> Vec<f64> {
    let start = values.len().saturating_sub(HISTORY_LEN);
    values[start..].to_vec()
}

/// Simple moving average. NaN until `period - 1`.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let mut sum: f64 = values[..period].iter().sum();
    out[period - 1] = sum / period as f64;
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out[i] = sum / period as f64;
    }
    out
}

/// Exponential moving average seeded with the SMA of the first `period`
/// values, alpha = 2 / (period + 1). NaN until `period - 1`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = seed;

    let mut prev = seed;
    for i in period..values.len() {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        out[i] = prev;
    }
    out
}

/// Bollinger bands around the SMA using the population standard deviation
/// of each window. Returns (upper, lower).
pub fn bollinger(values: &[f64], period: usize, mult: f64) -> (Vec<f64>, Vec<f64>) {
    let mut upper = vec![f64::NAN; values.len()];
    let mut lower = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return (upper, lower);
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let var = window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / period as f64;
        let sd = var.sqrt();
        upper[i] = mean + mult * sd;
        lower[i] = mean - mult * sd;
    }
    (upper, lower)
}

/// Wilder's RSI. Seeds the average gain/loss over the first `period` diffs,
/// then smooths with alpha = 1 / period. NaN until index `period`.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    let mut gain_sum = 0.0;
    let mut loss_sum = 0.0;
    for i in 1..=period {
        let diff = values[i] - values[i - 1];
        if diff >= 0.0 {
            gain_sum += diff;
        } else {
            loss_sum += -diff;
        }
    }

    let mut avg_gain = gain_sum / period as f64;
    let mut avg_loss = loss_sum / period as f64;
    out[period] = rsi_value(avg_gain, avg_loss);

    for i in (period + 1)..values.len() {
        let diff = values[i] - values[i - 1];
        let (gain, loss) = if diff >= 0.0 { (diff, 0.0) } else { (0.0, -diff) };
        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        out[i] = rsi_value(avg_gain, avg_loss);
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    // Flat window reads as neutral rather than overbought
    if avg_gain == 0.0 && avg_loss == 0.0 {
        return 50.0;
    }
    if avg_loss == 0.0 {
        return 100.0;
    }
    if avg_gain == 0.0 {
        return 0.0;
    }
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// Fractional rate of change over `period`: (v[i] - v[i-p]) / v[i-p].
/// NaN for the first `period` values and wherever the base is zero.
pub fn momentum(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 {
        return out;
    }

    for i in period..values.len() {
        let base = values[i - period];
        if base != 0.0 {
            out[i] = (values[i] - base) / base;
        }
    }
    out
}

/// Average true range: rolling mean of the true-range series over `period`.
/// The first bar's true range is its own high-low span.
pub fn atr(bars: &[Bar], period: usize) -> Vec<f64> {
    let tr: Vec<f64> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i == 0 {
                bar.high - bar.low
            } else {
                let prev_close = bars[i - 1].close;
                (bar.high - bar.low)
                    .max((bar.high - prev_close).abs())
                    .max((bar.low - prev_close).abs())
            }
        })
        .collect();
    sma(&tr, period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Quote;
    use chrono::TimeZone;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                time: Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
                open: c,
                high: c + 0.5,
                low: c - 0.5,
                close: c,
            })
            .collect()
    }

    fn snapshot(closes: &[f64]) -> MarketSnapshot {
        let bars = bars_from_closes(closes);
        let last = bars.last().unwrap();
        let bid = Decimal::from_f64(last.close).unwrap();
        MarketSnapshot {
            symbol: "XAUUSD".to_string(),
            quote: Quote {
                time: last.time,
                bid,
                ask: bid + Decimal::new(2, 1),
            },
            bars,
        }
    }

    #[test]
    fn test_sma_known_values() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_eq!(out[2], 2.0);
        assert_eq!(out[3], 3.0);
        assert_eq!(out[4], 4.0);
    }

    #[test]
    fn test_ema_seeds_with_sma() {
        let out = ema(&[2.0, 4.0, 6.0, 8.0], 3);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 4.0);
        // alpha = 0.5: 0.5 * 8 + 0.5 * 4
        assert_eq!(out[3], 6.0);
    }

    #[test]
    fn test_rsi_extremes() {
        let rising: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&rising, 14);
        assert!(out[13].is_nan());
        assert_eq!(out[14], 100.0);
        assert_eq!(*out.last().unwrap(), 100.0);

        let falling: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        assert_eq!(*rsi(&falling, 14).last().unwrap(), 0.0);

        let flat = vec![100.0; 20];
        assert_eq!(*rsi(&flat, 14).last().unwrap(), 50.0);
    }

    #[test]
    fn test_momentum_fractional() {
        let values = vec![100.0, 101.0, 102.0, 103.0, 110.0];
        let out = momentum(&values, 4);
        assert!(out[3].is_nan());
        assert!((out[4] - 0.10).abs() < 1e-12);
    }

    #[test]
    fn test_momentum_zero_base_is_undefined() {
        let out = momentum(&[0.0, 1.0, 2.0], 1);
        assert!(out[1].is_nan());
        assert!((out[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bollinger_constant_series_collapses() {
        let (upper, lower) = bollinger(&[50.0; 10], 5, 2.0);
        assert_eq!(*upper.last().unwrap(), 50.0);
        assert_eq!(*lower.last().unwrap(), 50.0);
    }

    #[test]
    fn test_atr_uses_gap_to_previous_close() {
        let mut bars = bars_from_closes(&[100.0, 100.0, 100.0]);
        // Gap down: high-low span is 1.0 but distance to previous close is 5.0
        bars[2].high = 95.5;
        bars[2].low = 94.5;
        bars[2].close = 95.0;

        let out = atr(&bars, 1);
        assert_eq!(out[2], 100.0 - 94.5);
    }

    #[test]
    fn test_cache_rejects_short_history() {
        let cache = IndicatorCache::new(vec![SeriesSpec::Ema(8), SeriesSpec::Ema(21)]);
        assert_eq!(cache.min_bars(), 21 + HISTORY_LEN);

        let snap = snapshot(&[100.0; 10]);
        match cache.update(&snap) {
            Err(IndicatorError::InsufficientHistory {
                required,
                available,
            }) => {
                assert_eq!(required, 29);
                assert_eq!(available, 10);
            }
            other => panic!("expected InsufficientHistory, got {other:?}"),
        }
    }

    #[test]
    fn test_cache_dedupes_specs() {
        let cache = IndicatorCache::new(vec![
            SeriesSpec::Ema(8),
            SeriesSpec::Ema(8),
            SeriesSpec::Rsi(14),
        ]);
        assert_eq!(cache.specs.len(), 2);
    }

    #[test]
    fn test_state_cross_detection() {
        // Fast EMA crosses above slow EMA after a price jump
        let mut closes = vec![100.0; 30];
        for (i, c) in closes.iter_mut().enumerate().skip(27) {
            *c = 100.0 + (i - 26) as f64 * 5.0;
        }
        let cache = IndicatorCache::new(vec![SeriesSpec::Ema(3), SeriesSpec::Ema(10)]);
        let state = cache.update(&snapshot(&closes)).unwrap();

        assert!(state.value("ema_3").unwrap() > state.value("ema_10").unwrap());
        assert!(state.value("close").is_some());
        assert!(!state.crossed_above("ema_3", "close"));
    }

    #[test]
    fn test_state_missing_series_is_none() {
        let cache = IndicatorCache::new(vec![SeriesSpec::Sma(3)]);
        let state = cache.update(&snapshot(&[100.0; 20])).unwrap();
        assert!(state.value("ema_99").is_none());
        assert!(state.back("sma_3", HISTORY_LEN).is_none());
    }
}
