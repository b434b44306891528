//! Bot configuration: risk limits, per-strategy parameters, presets, and
//! TOML file loading.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid configuration:\n  {}", .0.join("\n  "))]
    Invalid(Vec<String>),
}

/// Which evaluator a strategy block configures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    AggressiveScalp,
    MomentumBreakout,
    TrendCrossover,
    MeanReversion,
    TurboScalp,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::AggressiveScalp => "aggressive_scalp",
            StrategyKind::MomentumBreakout => "momentum_breakout",
            StrategyKind::TrendCrossover => "trend_crossover",
            StrategyKind::MeanReversion => "mean_reversion",
            StrategyKind::TurboScalp => "turbo_scalp",
        }
    }
}

/// Parameters for one strategy instance.
///
/// Not every field is meaningful for every kind; unused fields are ignored
/// by the evaluator and skipped by validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyParams {
    /// Unique name, used in logs, the journal, and position attribution
    pub name: String,

    pub kind: StrategyKind,

    /// Fast MA period (also the RSI period for mean reversion)
    #[serde(default = "default_fast_period")]
    pub fast_period: usize,

    /// Slow MA period (also the band period for mean reversion)
    #[serde(default = "default_slow_period")]
    pub slow_period: usize,

    /// Lookback for momentum / rate-of-change series
    #[serde(default = "default_momentum_period")]
    pub momentum_period: usize,

    /// Minimum fractional momentum or price delta before entering
    #[serde(default)]
    pub entry_threshold: f64,

    /// Bollinger band width in standard deviations
    #[serde(default = "default_band_mult")]
    pub band_mult: f64,

    #[serde(default = "default_oversold")]
    pub oversold: f64,

    #[serde(default = "default_overbought")]
    pub overbought: f64,

    /// Consecutive aligned cycles a crossover must persist before entry
    #[serde(default = "default_confirm_cycles")]
    pub confirm_cycles: u32,

    /// Minimum ATR as a fraction of price; filters dead markets
    #[serde(default)]
    pub min_atr: f64,

    /// Stop-loss distance in points
    pub stop_points: Decimal,

    /// Take-profit distance in points
    pub target_points: Decimal,

    /// Fraction of balance risked per trade
    pub risk_per_trade: Decimal,

    /// Ceiling on simultaneously open positions for this strategy
    pub max_positions: usize,

    /// Minimum time between two signals from this strategy
    #[serde(default)]
    pub cooldown_ms: u64,
}

fn default_fast_period() -> usize {
    9
}

fn default_slow_period() -> usize {
    21
}

fn default_momentum_period() -> usize {
    5
}

fn default_band_mult() -> f64 {
    2.0
}

fn default_oversold() -> f64 {
    30.0
}

fn default_overbought() -> f64 {
    70.0
}

fn default_confirm_cycles() -> u32 {
    1
}

/// Account-wide risk limits shared by all strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskLimits {
    /// Hard ceiling on open plus in-flight positions across all strategies
    pub max_open_positions: usize,

    /// Ceiling on the sum of reserved risk fractions
    pub max_total_risk: Decimal,

    /// Daily realized loss, as a fraction of the day-start balance, that
    /// trips the circuit breaker
    pub daily_loss_limit: Decimal,

    /// New entries are rejected below this free margin fraction
    pub min_free_margin: Decimal,

    /// Margin level (equity / margin, percent) below which the breaker
    /// flattens everything
    pub margin_call_level: Decimal,

    /// Per-order volume cap in lots
    pub max_volume: Decimal,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_open_positions: 10,
            max_total_risk: dec!(0.06),   // 6% of balance reserved at most
            daily_loss_limit: dec!(0.05), // halt the day at -5%
            min_free_margin: dec!(0.2),   // keep 20% of equity free
            margin_call_level: dec!(150), // flatten below 150% margin level
            max_volume: dec!(10),
        }
    }
}

/// Top-level bot configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Symbol traded by every strategy
    pub symbol: String,

    /// Evaluation cadence in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Upper bound on one snapshot fetch
    #[serde(default = "default_snapshot_timeout_ms")]
    pub snapshot_timeout_ms: u64,

    /// Bars requested per snapshot
    #[serde(default = "default_lookback_bars")]
    pub lookback_bars: usize,

    /// Seconds between summary log blocks and equity journal points
    #[serde(default = "default_summary_interval_secs")]
    pub summary_interval_secs: u64,

    /// Close all bot positions on shutdown
    #[serde(default = "default_true")]
    pub flatten_on_exit: bool,

    #[serde(default)]
    pub risk: RiskLimits,

    /// Strategy roster. Order is priority order: earlier entries compete
    /// first for the remaining risk budget each cycle.
    pub strategies: Vec<StrategyParams>,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_snapshot_timeout_ms() -> u64 {
    5000
}

fn default_lookback_bars() -> usize {
    200
}

fn default_summary_interval_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self::conservative()
    }
}

impl TradingConfig {
    /// Steady preset: second-scale cadence, wide stops, drawn-out cooldowns.
    pub fn conservative() -> Self {
        Self {
            symbol: "XAUUSD".to_string(),
            tick_interval_ms: 1000,
            snapshot_timeout_ms: 5000,
            lookback_bars: 200,
            summary_interval_secs: 30,
            flatten_on_exit: true,
            risk: RiskLimits::default(),
            strategies: vec![
                StrategyParams {
                    name: "trend_crossover".to_string(),
                    kind: StrategyKind::TrendCrossover,
                    fast_period: 8,
                    slow_period: 21,
                    momentum_period: default_momentum_period(),
                    entry_threshold: 0.0,
                    band_mult: default_band_mult(),
                    oversold: default_oversold(),
                    overbought: default_overbought(),
                    confirm_cycles: 2,
                    min_atr: 0.0,
                    stop_points: dec!(120),
                    target_points: dec!(200),
                    risk_per_trade: dec!(0.005),
                    max_positions: 2,
                    cooldown_ms: 10_000,
                },
                StrategyParams {
                    name: "aggressive_scalp".to_string(),
                    kind: StrategyKind::AggressiveScalp,
                    fast_period: 5,
                    slow_period: 13,
                    momentum_period: 3,
                    entry_threshold: 0.0,
                    band_mult: default_band_mult(),
                    oversold: default_oversold(),
                    overbought: default_overbought(),
                    confirm_cycles: default_confirm_cycles(),
                    min_atr: 0.0,
                    stop_points: dec!(40),
                    target_points: dec!(60),
                    risk_per_trade: dec!(0.003),
                    max_positions: 3,
                    cooldown_ms: 2_000,
                },
                StrategyParams {
                    name: "momentum_breakout".to_string(),
                    kind: StrategyKind::MomentumBreakout,
                    fast_period: default_fast_period(),
                    slow_period: default_slow_period(),
                    momentum_period: 5,
                    entry_threshold: 0.003,
                    band_mult: default_band_mult(),
                    oversold: default_oversold(),
                    overbought: default_overbought(),
                    confirm_cycles: default_confirm_cycles(),
                    min_atr: 0.0005,
                    stop_points: dec!(80),
                    target_points: dec!(160),
                    risk_per_trade: dec!(0.007),
                    max_positions: 2,
                    cooldown_ms: 5_000,
                },
                StrategyParams {
                    name: "mean_reversion".to_string(),
                    kind: StrategyKind::MeanReversion,
                    fast_period: 14, // RSI period
                    slow_period: 15, // band period
                    momentum_period: default_momentum_period(),
                    entry_threshold: 0.0,
                    band_mult: 1.2,
                    oversold: 35.0,
                    overbought: 65.0,
                    confirm_cycles: default_confirm_cycles(),
                    min_atr: 0.0,
                    stop_points: dec!(100),
                    target_points: dec!(150),
                    risk_per_trade: dec!(0.006),
                    max_positions: 2,
                    cooldown_ms: 8_000,
                },
                StrategyParams {
                    name: "turbo_scalp".to_string(),
                    kind: StrategyKind::TurboScalp,
                    fast_period: 3,
                    slow_period: 7,
                    momentum_period: default_momentum_period(),
                    entry_threshold: 0.0001,
                    band_mult: default_band_mult(),
                    oversold: default_oversold(),
                    overbought: default_overbought(),
                    confirm_cycles: default_confirm_cycles(),
                    min_atr: 0.0,
                    stop_points: dec!(15),
                    target_points: dec!(25),
                    risk_per_trade: dec!(0.002),
                    max_positions: 4,
                    cooldown_ms: 1_000,
                },
            ],
        }
    }

    /// Fast preset: 50 ms cadence, tight stops, short or no cooldowns.
    pub fn high_frequency() -> Self {
        let mut config = Self::conservative();
        config.tick_interval_ms = 50;
        config.snapshot_timeout_ms = 500;
        config.lookback_bars = 100;
        config.summary_interval_secs = 10;
        config.risk = RiskLimits {
            max_open_positions: 8,
            max_total_risk: dec!(0.04),
            daily_loss_limit: dec!(0.03),
            min_free_margin: dec!(0.2),
            margin_call_level: dec!(150),
            max_volume: dec!(5),
        };

        for params in &mut config.strategies {
            match params.kind {
                StrategyKind::TrendCrossover => {
                    params.fast_period = 5;
                    params.slow_period = 13;
                    params.confirm_cycles = 1;
                    params.stop_points = dec!(60);
                    params.target_points = dec!(100);
                    params.risk_per_trade = dec!(0.004);
                    params.cooldown_ms = 3_000;
                }
                StrategyKind::AggressiveScalp => {
                    params.fast_period = 3;
                    params.slow_period = 8;
                    params.momentum_period = 2;
                    params.stop_points = dec!(20);
                    params.target_points = dec!(30);
                    params.risk_per_trade = dec!(0.002);
                    params.cooldown_ms = 1_000;
                }
                StrategyKind::MomentumBreakout => {
                    params.momentum_period = 3;
                    params.entry_threshold = 0.001;
                    params.min_atr = 0.0003;
                    params.stop_points = dec!(40);
                    params.target_points = dec!(80);
                    params.risk_per_trade = dec!(0.005);
                    params.cooldown_ms = 2_000;
                }
                StrategyKind::MeanReversion => {
                    params.fast_period = 7;
                    params.slow_period = 10;
                    params.band_mult = 1.5;
                    params.oversold = 30.0;
                    params.overbought = 70.0;
                    params.stop_points = dec!(50);
                    params.target_points = dec!(75);
                    params.risk_per_trade = dec!(0.004);
                    params.cooldown_ms = 2_000;
                }
                StrategyKind::TurboScalp => {
                    params.fast_period = 2;
                    params.slow_period = 5;
                    params.entry_threshold = 0.00005;
                    params.stop_points = dec!(10);
                    params.target_points = dec!(16);
                    params.risk_per_trade = dec!(0.002);
                    params.cooldown_ms = 0;
                }
            }
        }
        config
    }

    /// Look up a built-in preset by name.
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "conservative" => Some(Self::conservative()),
            "hft" | "high_frequency" => Some(Self::high_frequency()),
            _ => None,
        }
    }

    /// Load and parse a TOML config file. The result still needs
    /// [`validate`](Self::validate).
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            source: e,
        })
    }

    pub fn strategy(&self, name: &str) -> Option<&StrategyParams> {
        self.strategies.iter().find(|s| s.name == name)
    }

    /// Check every limit and strategy block, collecting all violations
    /// instead of stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.symbol.trim().is_empty() {
            errors.push("symbol must not be empty".to_string());
        }
        if self.tick_interval_ms == 0 {
            errors.push("tick_interval_ms must be at least 1".to_string());
        }
        if self.lookback_bars == 0 {
            errors.push("lookback_bars must be at least 1".to_string());
        }

        let risk = &self.risk;
        if risk.max_open_positions == 0 {
            errors.push("risk.max_open_positions must be at least 1".to_string());
        }
        if risk.max_total_risk <= Decimal::ZERO || risk.max_total_risk > Decimal::ONE {
            errors.push("risk.max_total_risk must be in (0, 1]".to_string());
        }
        if risk.daily_loss_limit <= Decimal::ZERO || risk.daily_loss_limit > Decimal::ONE {
            errors.push("risk.daily_loss_limit must be in (0, 1]".to_string());
        }
        if risk.min_free_margin < Decimal::ZERO || risk.min_free_margin >= Decimal::ONE {
            errors.push("risk.min_free_margin must be in [0, 1)".to_string());
        }
        if risk.margin_call_level <= Decimal::ZERO {
            errors.push("risk.margin_call_level must be positive".to_string());
        }
        if risk.max_volume <= Decimal::ZERO {
            errors.push("risk.max_volume must be positive".to_string());
        }

        if self.strategies.is_empty() {
            errors.push("at least one strategy must be configured".to_string());
        }

        let mut names = HashSet::new();
        let mut budget = Decimal::ZERO;
        for params in &self.strategies {
            let name = &params.name;
            if !names.insert(name.clone()) {
                errors.push(format!("duplicate strategy name '{name}'"));
            }

            if params.risk_per_trade <= Decimal::ZERO || params.risk_per_trade >= Decimal::ONE {
                errors.push(format!("{name}: risk_per_trade must be in (0, 1)"));
            }
            if params.stop_points <= Decimal::ZERO {
                errors.push(format!("{name}: stop_points must be positive"));
            }
            if params.target_points <= Decimal::ZERO {
                errors.push(format!("{name}: target_points must be positive"));
            }
            if params.max_positions == 0 {
                errors.push(format!("{name}: max_positions must be at least 1"));
            }

            match params.kind {
                StrategyKind::AggressiveScalp | StrategyKind::TurboScalp => {
                    if params.fast_period >= params.slow_period {
                        errors.push(format!("{name}: fast_period must be below slow_period"));
                    }
                    if params.kind == StrategyKind::AggressiveScalp && params.momentum_period == 0 {
                        errors.push(format!("{name}: momentum_period must be at least 1"));
                    }
                }
                StrategyKind::MomentumBreakout => {
                    if params.momentum_period == 0 {
                        errors.push(format!("{name}: momentum_period must be at least 1"));
                    }
                    if params.min_atr < 0.0 {
                        errors.push(format!("{name}: min_atr must not be negative"));
                    }
                }
                StrategyKind::TrendCrossover => {
                    if params.fast_period >= params.slow_period {
                        errors.push(format!("{name}: fast_period must be below slow_period"));
                    }
                    if params.confirm_cycles == 0 {
                        errors.push(format!("{name}: confirm_cycles must be at least 1"));
                    }
                }
                StrategyKind::MeanReversion => {
                    if params.oversold >= params.overbought {
                        errors.push(format!("{name}: oversold must be below overbought"));
                    }
                    if params.band_mult <= 0.0 {
                        errors.push(format!("{name}: band_mult must be positive"));
                    }
                }
            }

            budget += Decimal::from(params.max_positions) * params.risk_per_trade;
        }

        // Worst case every strategy fills its ceiling; the combined
        // reservation must still fit the shared budget.
        if budget > risk.max_total_risk {
            errors.push(format!(
                "strategy risk budget {budget} exceeds risk.max_total_risk {}",
                risk.max_total_risk
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        TradingConfig::conservative().validate().unwrap();
        TradingConfig::high_frequency().validate().unwrap();
    }

    #[test]
    fn test_hft_budget_is_exactly_at_limit() {
        let config = TradingConfig::high_frequency();
        let budget: Decimal = config
            .strategies
            .iter()
            .map(|s| Decimal::from(s.max_positions) * s.risk_per_trade)
            .sum();
        assert_eq!(budget, config.risk.max_total_risk);
    }

    #[test]
    fn test_budget_overrun_rejected() {
        let mut config = TradingConfig::conservative();
        config.risk.max_total_risk = dec!(0.01);

        let err = config.validate().unwrap_err();
        match err {
            ConfigError::Invalid(errors) => {
                assert!(errors.iter().any(|e| e.contains("risk budget")));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_inverted_periods_rejected() {
        let mut config = TradingConfig::conservative();
        config.strategies[0].fast_period = 30;

        let err = config.validate().unwrap_err();
        match err {
            ConfigError::Invalid(errors) => {
                assert!(errors
                    .iter()
                    .any(|e| e.contains("fast_period must be below slow_period")));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut config = TradingConfig::conservative();
        let dup = config.strategies[0].clone();
        config.strategies.push(dup);
        // Budget doubles past the limit too; check the name error specifically
        config.risk.max_total_risk = dec!(0.5);

        let err = config.validate().unwrap_err();
        match err {
            ConfigError::Invalid(errors) => {
                assert!(errors
                    .iter()
                    .any(|e| e.contains("duplicate strategy name 'trend_crossover'")));
            }
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn test_toml_defaults_fill_in() {
        let raw = r#"
            symbol = "EURUSD"

            [[strategies]]
            name = "scalp"
            kind = "aggressive_scalp"
            fast_period = 4
            slow_period = 9
            stop_points = 25
            target_points = 40
            risk_per_trade = 0.002
            max_positions = 2
        "#;

        let config: TradingConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.lookback_bars, 200);
        assert!(config.flatten_on_exit);
        assert_eq!(config.risk.max_open_positions, 10);

        let scalp = config.strategy("scalp").unwrap();
        assert_eq!(scalp.momentum_period, 5);
        assert_eq!(scalp.entry_threshold, 0.0);
        assert_eq!(scalp.cooldown_ms, 0);
        assert_eq!(scalp.stop_points, dec!(25));

        config.validate().unwrap();
    }

    #[test]
    fn test_preset_lookup() {
        assert!(TradingConfig::preset("conservative").is_some());
        assert!(TradingConfig::preset("hft").is_some());
        assert!(TradingConfig::preset("yolo").is_none());
    }
}
