//! Shared risk accounting: the ledger, the admission gate, and the daily
//! circuit breaker.
//!
//! The ledger is the single source of truth for reserved risk and open
//! position counts. All mutation happens through the gate (admission),
//! commit/rollback (dispatch outcome), and close notifications; the bot
//! serializes those behind one mutex so no two signals are ever admitted
//! against the same sliver of remaining budget.

use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{ClosedPosition, PositionRecord, TradeSignal};
use crate::terminal::AccountState;
use crate::trading::config::{RiskLimits, StrategyParams};

/// Why the gate turned a signal away. Ordered by check priority: the first
/// failing check wins, so a halted day always reports `DailyLimitReached`
/// even when other limits are also breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    DailyLimitReached,
    StrategyPositionLimit,
    GlobalPositionLimit,
    RiskBudgetExceeded,
    InsufficientMargin,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::DailyLimitReached => "daily_limit_reached",
            RejectReason::StrategyPositionLimit => "strategy_position_limit",
            RejectReason::GlobalPositionLimit => "global_position_limit",
            RejectReason::RiskBudgetExceeded => "risk_budget_exceeded",
            RejectReason::InsufficientMargin => "insufficient_margin",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Admission token. Risk and a position slot are held under this id until
/// the dispatch outcome commits or rolls it back.
#[derive(Debug, Clone)]
pub struct RiskReservation {
    pub id: u64,
    pub strategy: String,
    pub risk_fraction: Decimal,
}

/// Breaker state for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakerState {
    Active,
    Halted,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerState::Active => write!(f, "active"),
            BreakerState::Halted => write!(f, "halted"),
        }
    }
}

/// Account, day, and exposure state shared by every strategy.
#[derive(Debug)]
pub struct RiskLedger {
    /// Last reported account balance
    balance: Decimal,
    equity: Decimal,
    free_margin: Decimal,
    /// Equity / margin as a percentage; `None` while nothing is open
    margin_level: Option<Decimal>,

    /// Balance snapshotted at the day boundary; loss fractions are
    /// measured against it
    day_start_balance: Decimal,
    daily_realized: Decimal,
    current_day: NaiveDate,
    halted: bool,

    daily_trades: u32,
    daily_wins: u32,
    daily_losses: u32,

    /// Open positions keyed by terminal ticket
    open: HashMap<u64, PositionRecord>,
    /// Admitted signals whose dispatch outcome is still unknown,
    /// keyed by reservation id: (strategy, risk fraction)
    pending: HashMap<u64, (String, Decimal)>,
    next_reservation: u64,
}

impl RiskLedger {
    pub fn new(account: &AccountState, day: NaiveDate) -> Self {
        Self {
            balance: account.balance,
            equity: account.equity,
            free_margin: account.free_margin,
            margin_level: account.margin_level(),
            day_start_balance: account.balance,
            daily_realized: Decimal::ZERO,
            current_day: day,
            halted: false,
            daily_trades: 0,
            daily_wins: 0,
            daily_losses: 0,
            open: HashMap::new(),
            pending: HashMap::new(),
            next_reservation: 1,
        }
    }

    /// Refresh account figures from the latest terminal report.
    pub fn sync_account(&mut self, account: &AccountState) {
        self.balance = account.balance;
        self.equity = account.equity;
        self.free_margin = account.free_margin;
        self.margin_level = account.margin_level();
    }

    /// Day-boundary reset: re-snapshot the start-of-day balance, clear the
    /// realized total and counters, and re-arm the breaker.
    pub fn roll_day(&mut self, day: NaiveDate, account: &AccountState) {
        self.sync_account(account);
        self.current_day = day;
        self.day_start_balance = account.balance;
        self.daily_realized = Decimal::ZERO;
        self.halted = false;
        self.daily_trades = 0;
        self.daily_wins = 0;
        self.daily_losses = 0;
    }

    /// Fold a close notification into the day's realized total and release
    /// the position's risk.
    pub fn apply_close(&mut self, closed: &ClosedPosition) {
        self.open.remove(&closed.position.ticket);
        self.daily_realized += closed.profit;
        self.daily_trades += 1;
        if closed.profit >= Decimal::ZERO {
            self.daily_wins += 1;
        } else {
            self.daily_losses += 1;
        }
    }

    /// Hold risk and a position slot for an admitted signal.
    fn reserve(&mut self, strategy: &str, risk_fraction: Decimal) -> RiskReservation {
        let id = self.next_reservation;
        self.next_reservation += 1;
        self.pending
            .insert(id, (strategy.to_string(), risk_fraction));
        RiskReservation {
            id,
            strategy: strategy.to_string(),
            risk_fraction,
        }
    }

    /// Convert a reservation into an open position after a fill.
    pub fn commit(&mut self, reservation: &RiskReservation, position: PositionRecord) {
        self.pending.remove(&reservation.id);
        self.open.insert(position.ticket, position);
    }

    /// Release a reservation whose dispatch was rejected or failed.
    pub fn rollback(&mut self, reservation: &RiskReservation) {
        self.pending.remove(&reservation.id);
    }

    /// Track a position discovered at the terminal (startup reconcile).
    pub fn track(&mut self, position: PositionRecord) {
        self.open.insert(position.ticket, position);
    }

    /// Drop a position the terminal no longer reports.
    pub fn forget(&mut self, ticket: u64) -> Option<PositionRecord> {
        self.open.remove(&ticket)
    }

    pub fn position(&self, ticket: u64) -> Option<&PositionRecord> {
        self.open.get(&ticket)
    }

    pub fn positions(&self) -> impl Iterator<Item = &PositionRecord> {
        self.open.values()
    }

    pub fn open_tickets(&self) -> Vec<u64> {
        self.open.keys().copied().collect()
    }

    /// Open plus in-flight positions.
    pub fn open_count(&self) -> usize {
        self.open.len() + self.pending.len()
    }

    /// Open plus in-flight positions attributed to one strategy.
    pub fn strategy_count(&self, strategy: &str) -> usize {
        let open = self
            .open
            .values()
            .filter(|p| p.strategy == strategy)
            .count();
        let pending = self
            .pending
            .values()
            .filter(|(s, _)| s == strategy)
            .count();
        open + pending
    }

    /// Sum of reserved risk fractions, open and in-flight.
    pub fn open_risk(&self) -> Decimal {
        let open: Decimal = self.open.values().map(|p| p.risk_fraction).sum();
        let pending: Decimal = self.pending.values().map(|(_, r)| *r).sum();
        open + pending
    }

    /// Realized loss so far today as a fraction of the day-start balance.
    /// Zero while the day is flat or profitable.
    pub fn daily_loss_fraction(&self) -> Decimal {
        if self.day_start_balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let loss = -self.daily_realized;
        if loss <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        loss / self.day_start_balance
    }

    /// Free margin as a fraction of equity.
    pub fn free_margin_fraction(&self) -> Decimal {
        if self.equity <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.free_margin / self.equity
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn equity(&self) -> Decimal {
        self.equity
    }

    pub fn margin_level(&self) -> Option<Decimal> {
        self.margin_level
    }

    pub fn day_start_balance(&self) -> Decimal {
        self.day_start_balance
    }

    pub fn daily_realized(&self) -> Decimal {
        self.daily_realized
    }

    pub fn current_day(&self) -> NaiveDate {
        self.current_day
    }

    pub fn daily_trades(&self) -> u32 {
        self.daily_trades
    }

    pub fn daily_wins(&self) -> u32 {
        self.daily_wins
    }

    pub fn daily_losses(&self) -> u32 {
        self.daily_losses
    }

    /// Stop admitting entries until the next day boundary.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn breaker_state(&self) -> BreakerState {
        if self.halted {
            BreakerState::Halted
        } else {
            BreakerState::Active
        }
    }
}

/// Admission control over the shared ledger.
///
/// Checks run in a fixed order and the first failure wins; an admitted
/// signal leaves a reservation in the ledger that the dispatcher must
/// commit or roll back.
pub struct RiskGate {
    limits: RiskLimits,
}

impl RiskGate {
    pub fn new(limits: RiskLimits) -> Self {
        Self { limits }
    }

    pub fn admit(
        &self,
        signal: &TradeSignal,
        params: &StrategyParams,
        ledger: &mut RiskLedger,
    ) -> Result<RiskReservation, RejectReason> {
        if ledger.is_halted() {
            return Err(RejectReason::DailyLimitReached);
        }
        if ledger.strategy_count(&signal.strategy) >= params.max_positions {
            return Err(RejectReason::StrategyPositionLimit);
        }
        if ledger.open_count() >= self.limits.max_open_positions {
            return Err(RejectReason::GlobalPositionLimit);
        }
        if ledger.open_risk() + params.risk_per_trade > self.limits.max_total_risk {
            return Err(RejectReason::RiskBudgetExceeded);
        }
        if ledger.free_margin_fraction() < self.limits.min_free_margin {
            return Err(RejectReason::InsufficientMargin);
        }

        Ok(ledger.reserve(&signal.strategy, params.risk_per_trade))
    }
}

/// What tripped the breaker this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BreakerTrip {
    /// Daily realized loss reached the configured fraction. Open positions
    /// stay on; their stops are broker-resident.
    DailyLoss { loss_fraction: Decimal },

    /// Margin level fell below the critical threshold. Everything gets
    /// flattened.
    MarginCritical { level: Decimal },
}

/// Daily loss and margin health monitor. Stateless; the halt itself lives
/// in the ledger so it survives between checks.
pub struct CircuitBreaker {
    daily_loss_limit: Decimal,
    margin_call_level: Decimal,
}

impl CircuitBreaker {
    pub fn new(limits: &RiskLimits) -> Self {
        Self {
            daily_loss_limit: limits.daily_loss_limit,
            margin_call_level: limits.margin_call_level,
        }
    }

    /// Evaluate after account sync and close notifications. Returns the
    /// trip to act on, or `None` when healthy or already halted.
    pub fn check(&self, ledger: &RiskLedger) -> Option<BreakerTrip> {
        if ledger.is_halted() {
            return None;
        }

        let loss_fraction = ledger.daily_loss_fraction();
        if loss_fraction >= self.daily_loss_limit {
            return Some(BreakerTrip::DailyLoss { loss_fraction });
        }

        if let Some(level) = ledger.margin_level() {
            if level < self.margin_call_level {
                return Some(BreakerTrip::MarginCritical { level });
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CloseReason, Direction};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn account(balance: Decimal) -> AccountState {
        AccountState {
            balance,
            equity: balance,
            margin: Decimal::ZERO,
            free_margin: balance,
            currency: "USD".to_string(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    fn limits() -> RiskLimits {
        RiskLimits {
            max_open_positions: 15,
            max_total_risk: dec!(0.06),
            daily_loss_limit: dec!(0.05),
            min_free_margin: dec!(0.2),
            margin_call_level: dec!(150),
            max_volume: dec!(10),
        }
    }

    fn params(name: &str, risk: Decimal, max_positions: usize) -> StrategyParams {
        let mut p = crate::trading::config::TradingConfig::conservative().strategies[0].clone();
        p.name = name.to_string();
        p.risk_per_trade = risk;
        p.max_positions = max_positions;
        p
    }

    fn signal(strategy: &str) -> TradeSignal {
        TradeSignal {
            strategy: strategy.to_string(),
            direction: Direction::Long,
            stop_points: dec!(40),
            target_points: dec!(60),
            generated_at: Utc::now(),
        }
    }

    fn position(ticket: u64, strategy: &str, risk: Decimal) -> PositionRecord {
        PositionRecord {
            ticket,
            strategy: strategy.to_string(),
            direction: Direction::Long,
            volume: dec!(1),
            entry_price: dec!(2400),
            stop_loss: dec!(2399),
            take_profit: dec!(2402),
            risk_fraction: risk,
            opened_at: Utc::now(),
        }
    }

    fn closed(ticket: u64, strategy: &str, profit: Decimal) -> ClosedPosition {
        ClosedPosition {
            position: position(ticket, strategy, dec!(0.003)),
            close_price: dec!(2400),
            profit,
            closed_at: Utc::now(),
            reason: CloseReason::StopLoss,
        }
    }

    #[test]
    fn test_admit_reserves_risk_and_slot() {
        let gate = RiskGate::new(limits());
        let mut ledger = RiskLedger::new(&account(dec!(10000)), day());
        let p = params("scalp", dec!(0.003), 3);

        let res = gate.admit(&signal("scalp"), &p, &mut ledger).unwrap();
        assert_eq!(res.risk_fraction, dec!(0.003));
        assert_eq!(ledger.open_count(), 1);
        assert_eq!(ledger.strategy_count("scalp"), 1);
        assert_eq!(ledger.open_risk(), dec!(0.003));
    }

    #[test]
    fn test_rollback_restores_everything() {
        let gate = RiskGate::new(limits());
        let mut ledger = RiskLedger::new(&account(dec!(10000)), day());
        let p = params("scalp", dec!(0.003), 3);

        let res = gate.admit(&signal("scalp"), &p, &mut ledger).unwrap();
        ledger.rollback(&res);

        assert_eq!(ledger.open_count(), 0);
        assert_eq!(ledger.strategy_count("scalp"), 0);
        assert_eq!(ledger.open_risk(), Decimal::ZERO);
    }

    #[test]
    fn test_commit_moves_reservation_to_open() {
        let gate = RiskGate::new(limits());
        let mut ledger = RiskLedger::new(&account(dec!(10000)), day());
        let p = params("scalp", dec!(0.003), 3);

        let res = gate.admit(&signal("scalp"), &p, &mut ledger).unwrap();
        ledger.commit(&res, position(42, "scalp", res.risk_fraction));

        assert_eq!(ledger.open_count(), 1);
        assert_eq!(ledger.open_risk(), dec!(0.003));
        assert!(ledger.position(42).is_some());
    }

    #[test]
    fn test_halted_day_rejects_first() {
        let gate = RiskGate::new(limits());
        let mut ledger = RiskLedger::new(&account(dec!(10000)), day());
        ledger.halt();

        // Also out of slots; the halt still wins
        let p = params("scalp", dec!(0.003), 0);
        let err = gate.admit(&signal("scalp"), &p, &mut ledger).unwrap_err();
        assert_eq!(err, RejectReason::DailyLimitReached);
    }

    #[test]
    fn test_strategy_limit_checked_before_global() {
        let gate = RiskGate::new(limits());
        let mut ledger = RiskLedger::new(&account(dec!(10000)), day());
        ledger.track(position(1, "scalp", dec!(0.003)));
        ledger.track(position(2, "scalp", dec!(0.003)));

        let p = params("scalp", dec!(0.003), 2);
        let err = gate.admit(&signal("scalp"), &p, &mut ledger).unwrap_err();
        assert_eq!(err, RejectReason::StrategyPositionLimit);
    }

    #[test]
    fn test_global_ceiling_rejects_without_mutation() {
        let gate = RiskGate::new(limits());
        let mut ledger = RiskLedger::new(&account(dec!(100000)), day());
        for ticket in 0..15 {
            // Spread across names so no per-strategy limit gets in the way
            ledger.track(position(ticket, &format!("s{ticket}"), dec!(0.001)));
        }

        let p = params("scalp", dec!(0.003), 3);
        let before_risk = ledger.open_risk();
        let err = gate.admit(&signal("scalp"), &p, &mut ledger).unwrap_err();

        assert_eq!(err, RejectReason::GlobalPositionLimit);
        assert_eq!(ledger.open_count(), 15);
        assert_eq!(ledger.open_risk(), before_risk);
    }

    #[test]
    fn test_budget_exhaustion_rejects_later_signal() {
        let gate = RiskGate::new(limits());
        let mut ledger = RiskLedger::new(&account(dec!(10000)), day());
        // 0.058 reserved out of 0.06
        for ticket in 0..2 {
            ledger.track(position(ticket, &format!("a{ticket}"), dec!(0.029)));
        }

        // 0.001 still fits
        let small = params("small", dec!(0.001), 1);
        gate.admit(&signal("small"), &small, &mut ledger).unwrap();

        // 0.003 no longer does
        let big = params("big", dec!(0.003), 1);
        let err = gate.admit(&signal("big"), &big, &mut ledger).unwrap_err();
        assert_eq!(err, RejectReason::RiskBudgetExceeded);

        // Reserved risk never exceeds the ceiling
        assert!(ledger.open_risk() <= limits().max_total_risk);
    }

    #[test]
    fn test_low_free_margin_rejects() {
        let gate = RiskGate::new(limits());
        let mut ledger = RiskLedger::new(&account(dec!(10000)), day());
        ledger.sync_account(&AccountState {
            balance: dec!(10000),
            equity: dec!(10000),
            margin: dec!(9000),
            free_margin: dec!(1000),
            currency: "USD".to_string(),
        });

        let p = params("scalp", dec!(0.003), 3);
        let err = gate.admit(&signal("scalp"), &p, &mut ledger).unwrap_err();
        assert_eq!(err, RejectReason::InsufficientMargin);
    }

    #[test]
    fn test_breaker_trips_at_exact_threshold() {
        let breaker = CircuitBreaker::new(&limits());
        let mut ledger = RiskLedger::new(&account(dec!(10000)), day());

        ledger.apply_close(&closed(1, "scalp", dec!(-499.99)));
        assert!(breaker.check(&ledger).is_none());

        // Exactly 5% of the day-start balance
        ledger.apply_close(&closed(2, "scalp", dec!(-0.01)));
        match breaker.check(&ledger) {
            Some(BreakerTrip::DailyLoss { loss_fraction }) => {
                assert_eq!(loss_fraction, dec!(0.05));
            }
            other => panic!("expected DailyLoss, got {other:?}"),
        }
    }

    #[test]
    fn test_halt_latches_until_day_roll() {
        let gate = RiskGate::new(limits());
        let breaker = CircuitBreaker::new(&limits());
        let mut ledger = RiskLedger::new(&account(dec!(10000)), day());

        ledger.apply_close(&closed(1, "scalp", dec!(-500)));
        assert!(breaker.check(&ledger).is_some());
        ledger.halt();

        // Already halted days report nothing new
        assert!(breaker.check(&ledger).is_none());

        // A winning close does not re-arm the day
        ledger.apply_close(&closed(2, "scalp", dec!(600)));
        let p = params("scalp", dec!(0.003), 3);
        let err = gate.admit(&signal("scalp"), &p, &mut ledger).unwrap_err();
        assert_eq!(err, RejectReason::DailyLimitReached);

        // The day boundary re-arms and re-snapshots
        let next_day = day().succ_opt().unwrap();
        ledger.roll_day(next_day, &account(dec!(10100)));
        assert!(!ledger.is_halted());
        assert_eq!(ledger.day_start_balance(), dec!(10100));
        assert_eq!(ledger.daily_loss_fraction(), Decimal::ZERO);
        gate.admit(&signal("scalp"), &p, &mut ledger).unwrap();
    }

    #[test]
    fn test_margin_critical_trip() {
        let breaker = CircuitBreaker::new(&limits());
        let mut ledger = RiskLedger::new(&account(dec!(10000)), day());
        ledger.sync_account(&AccountState {
            balance: dec!(10000),
            equity: dec!(3000),
            margin: dec!(2500),
            free_margin: dec!(500),
            currency: "USD".to_string(),
        });

        match breaker.check(&ledger) {
            Some(BreakerTrip::MarginCritical { level }) => {
                assert_eq!(level, dec!(120));
            }
            other => panic!("expected MarginCritical, got {other:?}"),
        }
    }

    #[test]
    fn test_profitable_day_has_zero_loss_fraction() {
        let mut ledger = RiskLedger::new(&account(dec!(10000)), day());
        ledger.apply_close(&closed(1, "scalp", dec!(250)));
        assert_eq!(ledger.daily_loss_fraction(), Decimal::ZERO);
        assert_eq!(ledger.daily_wins(), 1);
    }
}
