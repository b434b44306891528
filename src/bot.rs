//! Bot runner: the per-cycle decision pipeline and its orchestration loop.
//!
//! Each tick walks a fixed order: snapshot -> day roll -> close
//! notifications -> health check -> indicators -> strategy evaluation ->
//! risk gate -> sizing -> dispatch -> journal. Per-cycle failures degrade
//! to skipping the cycle or the signal; only startup errors abort.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::db::Database;
use crate::indicators::IndicatorCache;
use crate::metrics::{PerformanceCalculator, SessionReport};
use crate::models::{Direction, PositionRecord, Quote, StrategyStats, SymbolSpec, TradeSignal};
use crate::strategies::{self, Strategy};
use crate::terminal::{Broker, BrokerError, FeedError, MarketFeed, OrderRequest, OrderResult};
use crate::trading::{
    BreakerState, BreakerTrip, CircuitBreaker, PositionSizer, RiskGate, RiskLedger, TradingConfig,
};

/// Where the shutdown summary blob lands.
const SESSION_SUMMARY_PATH: &str = "multistrat-session.json";

/// Main bot runner: owns the pipeline components and the shared ledger.
pub struct Bot {
    config: TradingConfig,
    feed: Arc<dyn MarketFeed>,
    broker: Arc<dyn Broker>,
    db: Database,
    spec: SymbolSpec,
    cache: IndicatorCache,
    strategies: Vec<Box<dyn Strategy>>,
    gate: RiskGate,
    sizer: PositionSizer,
    breaker: CircuitBreaker,

    /// Shared risk state; every mutation goes through this mutex
    ledger: Mutex<RiskLedger>,

    stats: HashMap<String, StrategyStats>,
    session_pnls: Vec<Decimal>,
    equity_samples: Vec<f64>,
    started_at: DateTime<Utc>,
    last_summary: Instant,
    /// An emergency flatten that could not complete is retried each tick
    pending_flatten: bool,

    // Shutdown signal
    shutdown: Arc<AtomicBool>,
}

impl Bot {
    /// Create a new bot instance against an already-validated configuration.
    pub async fn new(
        config: TradingConfig,
        feed: Arc<dyn MarketFeed>,
        broker: Arc<dyn Broker>,
        database_url: &str,
    ) -> Result<Self> {
        let db = Database::new(database_url).await?;

        let spec = broker
            .symbol_spec(&config.symbol)
            .await
            .context("failed to load symbol spec")?;
        let account = broker
            .account()
            .await
            .context("failed to load account state")?;
        info!(
            balance = %account.balance,
            equity = %account.equity,
            currency = %account.currency,
            "Connected to terminal"
        );

        let roster = strategies::build_all(&config.strategies);
        let cache = IndicatorCache::new(roster.iter().flat_map(|s| s.series()).collect());
        anyhow::ensure!(
            cache.min_bars() <= config.lookback_bars,
            "lookback_bars {} is below the {} bars the indicator set needs",
            config.lookback_bars,
            cache.min_bars()
        );

        let ledger = RiskLedger::new(&account, Utc::now().date_naive());
        let stats = config
            .strategies
            .iter()
            .map(|p| (p.name.clone(), StrategyStats::default()))
            .collect();

        Ok(Self {
            gate: RiskGate::new(config.risk.clone()),
            sizer: PositionSizer::new(config.risk.max_volume),
            breaker: CircuitBreaker::new(&config.risk),
            config,
            feed,
            broker,
            db,
            spec,
            cache,
            strategies: roster,
            ledger: Mutex::new(ledger),
            stats,
            session_pnls: Vec::new(),
            equity_samples: Vec::new(),
            started_at: Utc::now(),
            last_summary: Instant::now(),
            pending_flatten: false,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Get shutdown signal for external control.
    pub fn shutdown_signal(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Reconcile the ledger against the terminal and the journal before the
    /// first tick. Positions the journal attributes to a strategy regain
    /// their risk reservation; anything else is tracked risk-free.
    pub async fn initialize(&mut self) -> Result<()> {
        let positions = self
            .broker
            .open_positions()
            .await
            .context("failed to list open positions")?;
        let journaled = self.db.get_open_positions().await?;
        let at_terminal: HashSet<u64> = positions.iter().map(|p| p.ticket).collect();

        let mut restored = 0usize;
        let mut foreign = 0usize;
        {
            let mut ledger = self.ledger.lock().await;
            for mut position in positions {
                if let Some(row) = journaled
                    .iter()
                    .find(|r| r.ticket as u64 == position.ticket)
                {
                    position.strategy = row.strategy.clone();
                    position.risk_fraction =
                        Decimal::try_from(row.risk_fraction).unwrap_or(Decimal::ZERO);
                    restored += 1;
                } else {
                    foreign += 1;
                }
                ledger.track(position);
            }
        }

        for row in &journaled {
            let ticket = row.ticket as u64;
            if !at_terminal.contains(&ticket) {
                warn!(ticket, strategy = %row.strategy, "Journaled position closed while offline");
                self.db.mark_position_closed(ticket, "manual").await?;
            }
        }

        info!(restored, foreign, "Bot initialized");
        Ok(())
    }

    /// Drive the tick loop until shutdown is requested or the feed ends.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            symbol = %self.config.symbol,
            interval_ms = self.config.tick_interval_ms,
            strategies = self.strategies.len(),
            "Starting trading loop"
        );

        let mut ticker = interval(Duration::from_millis(self.config.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Register shutdown handler
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received");
            shutdown.store(true, Ordering::SeqCst);
        });

        while !self.shutdown.load(Ordering::SeqCst) {
            ticker.tick().await;

            match self.tick().await {
                Ok(true) => {}
                Ok(false) => break,
                // Per-cycle errors never stop the loop
                Err(e) => error!(error = %e, "Error in bot tick"),
            }
        }

        self.shutdown().await
    }

    /// One decision cycle. Returns `Ok(false)` once the feed is exhausted
    /// and the loop should stop; recoverable problems skip the cycle.
    async fn tick(&mut self) -> Result<bool> {
        debug!("Bot tick");

        // 1. Snapshot, bounded by the configured timeout
        let fetch = self
            .feed
            .snapshot(&self.config.symbol, self.config.lookback_bars);
        let snapshot =
            match timeout(Duration::from_millis(self.config.snapshot_timeout_ms), fetch).await {
                Ok(Ok(snapshot)) => snapshot,
                Ok(Err(FeedError::Exhausted)) => {
                    info!("Bar tape exhausted, stopping");
                    return Ok(false);
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Snapshot failed, skipping cycle");
                    return Ok(true);
                }
                Err(_) => {
                    warn!(
                        timeout_ms = self.config.snapshot_timeout_ms,
                        "Snapshot timed out, skipping cycle"
                    );
                    return Ok(true);
                }
            };
        let now = snapshot.server_time();

        // 2. Account refresh and day boundary, on broker server time
        let account = match self.broker.account().await {
            Ok(account) => account,
            Err(e) => {
                warn!(error = %e, "Account refresh failed, skipping cycle");
                return Ok(true);
            }
        };
        let mut finished_day: Option<DailyCheckpoint> = None;
        {
            let mut ledger = self.ledger.lock().await;
            ledger.sync_account(&account);
            let today = now.date_naive();
            if today != ledger.current_day() {
                // Days without activity leave no summary row
                if ledger.daily_trades() > 0 || ledger.is_halted() {
                    finished_day = Some(DailyCheckpoint {
                        day: ledger.current_day(),
                        start_balance: ledger.day_start_balance(),
                        realized_pnl: ledger.daily_realized(),
                        trades: ledger.daily_trades(),
                        wins: ledger.daily_wins(),
                        losses: ledger.daily_losses(),
                        halted: ledger.is_halted(),
                    });
                }
                info!(day = %today, balance = %account.balance, "Trading day rolled");
                ledger.roll_day(today, &account);
            }
        }
        if let Some(day) = finished_day {
            if let Err(e) = self
                .db
                .upsert_daily_summary(
                    &day.day.to_string(),
                    day.start_balance,
                    day.realized_pnl,
                    day.trades,
                    day.wins,
                    day.losses,
                    day.halted,
                )
                .await
            {
                warn!(error = %e, "Failed to close out the daily summary");
            }
        }

        // 3. Close notifications
        if let Err(e) = self.apply_close_notifications().await {
            warn!(error = %e, "Skipping cycle");
            return Ok(true);
        }

        // 4. Health check; a halt latches in the ledger until the day rolls
        let trip = {
            let mut ledger = self.ledger.lock().await;
            let trip = self.breaker.check(&ledger);
            if trip.is_some() {
                ledger.halt();
            }
            trip
        };
        match trip {
            Some(BreakerTrip::DailyLoss { loss_fraction }) => {
                warn!(
                    loss = %loss_fraction,
                    limit = %self.config.risk.daily_loss_limit,
                    "Daily loss limit reached, no more entries today"
                );
            }
            Some(BreakerTrip::MarginCritical { level }) => {
                error!(
                    margin_level = %level,
                    critical = %self.config.risk.margin_call_level,
                    "Margin level critical, flattening all positions"
                );
                self.pending_flatten = true;
            }
            None => {}
        }
        if self.pending_flatten {
            if { self.ledger.lock().await.open_count() } == 0 {
                self.pending_flatten = false;
            } else if let Err(e) = self.flatten_all().await {
                error!(error = %e, "Emergency flatten incomplete, retrying next cycle");
            }
        }

        // 5. Indicators
        let state = match self.cache.update(&snapshot) {
            Ok(state) => state,
            Err(e) => {
                debug!(error = %e, "Skipping cycle");
                return Ok(true);
            }
        };

        // 6. Evaluate every strategy against the shared state
        let mut candidates = Vec::new();
        for strategy in &mut self.strategies {
            if let Some(signal) = strategy.evaluate(&state, now) {
                info!(
                    strategy = %signal.strategy,
                    direction = %signal.direction,
                    "Signal emitted"
                );
                if let Some(stats) = self.stats.get_mut(&signal.strategy) {
                    stats.signals += 1;
                    stats.last_signal_at = Some(now);
                }
                candidates.push(signal);
            }
        }

        // 7. Gate, size, and dispatch in priority (declaration) order
        let quote = snapshot.quote;
        for signal in &candidates {
            self.process_signal(signal, &quote).await;
        }

        // 8. Periodic summary and journal checkpoint
        if self.last_summary.elapsed() >= Duration::from_secs(self.config.summary_interval_secs) {
            self.last_summary = Instant::now();
            self.persist_checkpoint().await;
            info!("{}", self.status().await);
        }

        Ok(true)
    }

    /// Gate, size, dispatch, and journal one candidate signal.
    ///
    /// Every failure past admission rolls the reservation back, so the
    /// ledger never carries an order whose outcome is unknown.
    async fn process_signal(&mut self, signal: &TradeSignal, quote: &Quote) {
        let Some(params) = self.config.strategy(&signal.strategy) else {
            warn!(strategy = %signal.strategy, "Signal from unconfigured strategy dropped");
            return;
        };

        // Admission: the reads and the reservation share one critical section
        let (reservation, balance) = {
            let mut ledger = self.ledger.lock().await;
            let balance = ledger.balance();
            match self.gate.admit(signal, params, &mut ledger) {
                Ok(reservation) => (reservation, balance),
                Err(reason) => {
                    debug!(strategy = %signal.strategy, reason = %reason, "Signal rejected");
                    if let Some(stats) = self.stats.get_mut(&signal.strategy) {
                        stats.rejected += 1;
                    }
                    return;
                }
            }
        };
        if let Some(stats) = self.stats.get_mut(&signal.strategy) {
            stats.admitted += 1;
        }

        let volume = match self.sizer.size(
            balance,
            params.risk_per_trade,
            params.stop_points,
            &self.spec,
        ) {
            Ok(volume) => volume,
            Err(e) => {
                warn!(strategy = %signal.strategy, error = %e, "Sizing failed, releasing reservation");
                self.ledger.lock().await.rollback(&reservation);
                return;
            }
        };

        // Protective levels off the current quote; the terminal keeps them
        let stop_offset = self.spec.points_to_price(params.stop_points);
        let target_offset = self.spec.points_to_price(params.target_points);
        let (stop_loss, take_profit) = match signal.direction {
            Direction::Long => (quote.ask - stop_offset, quote.ask + target_offset),
            Direction::Short => (quote.bid + stop_offset, quote.bid - target_offset),
        };

        let request = OrderRequest {
            client_id: Uuid::new_v4().to_string(),
            symbol: self.config.symbol.clone(),
            direction: signal.direction,
            volume,
            stop_loss,
            take_profit,
            comment: signal.strategy.clone(),
        };

        if let Err(e) = self
            .db
            .insert_order(
                &request.client_id,
                &signal.strategy,
                &signal.direction.to_string(),
                volume,
                stop_loss,
                take_profit,
            )
            .await
        {
            warn!(error = %e, "Failed to journal order");
        }

        match self.broker.submit(&request).await {
            Ok(OrderResult::Filled { ticket, price }) => {
                let position = PositionRecord {
                    ticket,
                    strategy: signal.strategy.clone(),
                    direction: signal.direction,
                    volume,
                    entry_price: price,
                    stop_loss,
                    take_profit,
                    risk_fraction: reservation.risk_fraction,
                    opened_at: signal.generated_at,
                };
                self.ledger
                    .lock()
                    .await
                    .commit(&reservation, position.clone());
                if let Some(stats) = self.stats.get_mut(&signal.strategy) {
                    stats.filled += 1;
                }
                info!(
                    strategy = %signal.strategy,
                    ticket,
                    direction = %signal.direction,
                    volume = %volume,
                    price = %price,
                    sl = %stop_loss,
                    tp = %take_profit,
                    "Order filled"
                );
                if let Err(e) = self
                    .db
                    .update_order_status(
                        &request.client_id,
                        "filled",
                        Some(ticket as i64),
                        price.to_f64(),
                        None,
                    )
                    .await
                {
                    warn!(error = %e, "Failed to journal fill");
                }
                if let Err(e) = self.db.open_position(&position).await {
                    warn!(error = %e, "Failed to journal position");
                }
            }
            Ok(OrderResult::Rejected { reason }) => {
                self.ledger.lock().await.rollback(&reservation);
                if let Some(stats) = self.stats.get_mut(&signal.strategy) {
                    stats.failed += 1;
                }
                warn!(strategy = %signal.strategy, reason = %reason, "Order rejected by terminal");
                if let Err(e) = self
                    .db
                    .update_order_status(&request.client_id, "rejected", None, None, Some(&reason))
                    .await
                {
                    warn!(error = %e, "Failed to journal rejection");
                }
            }
            Err(e) => {
                self.ledger.lock().await.rollback(&reservation);
                if let Some(stats) = self.stats.get_mut(&signal.strategy) {
                    stats.failed += 1;
                }
                match &e {
                    BrokerError::ExecutionDisabled => warn!(
                        strategy = %signal.strategy,
                        "Automated trading disabled at the terminal, order not placed"
                    ),
                    BrokerError::Connection(_) => warn!(
                        strategy = %signal.strategy,
                        error = %e,
                        "Dispatch failed, reservation rolled back"
                    ),
                }
                if let Err(db_err) = self
                    .db
                    .update_order_status(
                        &request.client_id,
                        "failed",
                        None,
                        None,
                        Some(&e.to_string()),
                    )
                    .await
                {
                    warn!(error = %db_err, "Failed to journal dispatch failure");
                }
            }
        }
    }

    /// Drain closes reported by the terminal and fold them into the
    /// ledger, the per-strategy counters, and the journal.
    async fn apply_close_notifications(&mut self) -> Result<()> {
        let closed = self
            .broker
            .drain_closed()
            .await
            .context("failed to poll closed positions")?;
        if closed.is_empty() {
            return Ok(());
        }

        {
            let mut ledger = self.ledger.lock().await;
            for close in &closed {
                ledger.apply_close(close);
            }
        }

        for close in &closed {
            let position = &close.position;
            info!(
                ticket = position.ticket,
                strategy = %position.strategy,
                reason = %close.reason,
                price = %close.close_price,
                profit = %close.profit,
                "Position closed"
            );
            self.session_pnls.push(close.profit);
            if let Some(stats) = self.stats.get_mut(&position.strategy) {
                stats.record_close(close.profit);
            }
            if let Err(e) = self
                .db
                .close_position(
                    position.ticket,
                    close.close_price,
                    close.profit,
                    close.reason.as_str(),
                )
                .await
            {
                warn!(error = %e, "Failed to journal close");
            }
        }
        Ok(())
    }

    /// Request closure of every open position, then apply the results.
    async fn flatten_all(&mut self) -> Result<()> {
        let tickets = { self.ledger.lock().await.open_tickets() };
        if tickets.is_empty() {
            return Ok(());
        }

        info!(count = tickets.len(), "Flattening all open positions");
        for ticket in tickets {
            if let Err(e) = self.broker.close(ticket).await {
                error!(ticket, error = %e, "Failed to close position");
            }
        }
        self.apply_close_notifications().await
    }

    /// Persist an equity sample and refresh the current day's summary row.
    async fn persist_checkpoint(&mut self) {
        let ledger = self.ledger.lock().await;
        let balance = ledger.balance();
        let equity = ledger.equity();
        let open_risk = ledger.open_risk();
        let open_count = ledger.open_count();
        let daily = ledger.daily_realized();
        let day = ledger.current_day();
        let start = ledger.day_start_balance();
        let trades = ledger.daily_trades();
        let wins = ledger.daily_wins();
        let losses = ledger.daily_losses();
        let halted = ledger.is_halted();
        drop(ledger);

        self.equity_samples.push(equity.to_f64().unwrap_or(0.0));
        if let Err(e) = self
            .db
            .record_equity_point(balance, equity, open_risk, open_count, daily)
            .await
        {
            warn!(error = %e, "Failed to record equity point");
        }
        if let Err(e) = self
            .db
            .upsert_daily_summary(&day.to_string(), start, daily, trades, wins, losses, halted)
            .await
        {
            warn!(error = %e, "Failed to update daily summary");
        }
    }

    /// Wind down: optionally flatten, reconcile the ledger against the
    /// terminal, persist the final journal rows, and write the session blob.
    async fn shutdown(&mut self) -> Result<()> {
        info!("Shutting down...");

        if self.config.flatten_on_exit {
            if let Err(e) = self.flatten_all().await {
                error!(error = %e, "Flatten on exit failed");
            }
        } else if let Err(e) = self.apply_close_notifications().await {
            warn!(error = %e, "Failed to drain final close notifications");
        }

        match self.broker.open_positions().await {
            Ok(remaining) => {
                let known: HashSet<u64> = remaining.iter().map(|p| p.ticket).collect();
                let stale: Vec<u64> = {
                    let mut ledger = self.ledger.lock().await;
                    let stale: Vec<u64> = ledger
                        .open_tickets()
                        .into_iter()
                        .filter(|ticket| !known.contains(ticket))
                        .collect();
                    for &ticket in &stale {
                        ledger.forget(ticket);
                    }
                    stale
                };
                for ticket in stale {
                    warn!(ticket, "Ledger position no longer at the terminal, dropped");
                    if let Err(e) = self.db.mark_position_closed(ticket, "manual").await {
                        warn!(error = %e, "Failed to journal reconciled close");
                    }
                }
            }
            Err(e) => warn!(error = %e, "Could not reconcile open positions at shutdown"),
        }

        self.persist_checkpoint().await;
        self.write_session_summary().await;

        info!("Shutdown complete");
        Ok(())
    }

    /// Serialize the session summary blob for post-run analysis.
    async fn write_session_summary(&self) {
        let report = self.session_report();
        let (balance, equity) = {
            let ledger = self.ledger.lock().await;
            (ledger.balance(), ledger.equity())
        };
        let summary = SessionSummary {
            started_at: self.started_at,
            ended_at: Utc::now(),
            symbol: &self.config.symbol,
            final_balance: balance,
            final_equity: equity,
            report: &report,
            strategies: &self.stats,
        };

        match serde_json::to_string_pretty(&summary) {
            Ok(blob) => {
                if let Err(e) = std::fs::write(SESSION_SUMMARY_PATH, blob) {
                    warn!(error = %e, path = SESSION_SUMMARY_PATH, "Failed to write session summary");
                } else {
                    info!(path = SESSION_SUMMARY_PATH, "Session summary written");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize session summary"),
        }
    }

    /// Performance over the closes and equity samples seen this session.
    pub fn session_report(&self) -> SessionReport {
        PerformanceCalculator::report(&self.session_pnls, &self.equity_samples)
    }

    /// Current ledger and counter snapshot for the status block.
    pub async fn status(&self) -> BotStats {
        let ledger = self.ledger.lock().await;
        let strategies = self
            .strategies
            .iter()
            .map(|s| {
                let name = s.name().to_string();
                StrategyLine {
                    open: ledger.strategy_count(&name),
                    stats: self.stats.get(&name).cloned().unwrap_or_default(),
                    name,
                }
            })
            .collect();

        BotStats {
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
            symbol: self.config.symbol.clone(),
            balance: ledger.balance(),
            equity: ledger.equity(),
            margin_level: ledger.margin_level(),
            open_positions: ledger.open_count(),
            open_risk: ledger.open_risk(),
            max_total_risk: self.config.risk.max_total_risk,
            daily_pnl: ledger.daily_realized(),
            daily_loss_limit: self.config.risk.daily_loss_limit,
            day_start_balance: ledger.day_start_balance(),
            breaker: ledger.breaker_state(),
            strategies,
        }
    }
}

/// Final numbers of one trading day, captured before the ledger rolls.
struct DailyCheckpoint {
    day: NaiveDate,
    start_balance: Decimal,
    realized_pnl: Decimal,
    trades: u32,
    wins: u32,
    losses: u32,
    halted: bool,
}

/// Shutdown blob serialized to disk for post-run analysis.
#[derive(Serialize)]
struct SessionSummary<'a> {
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    symbol: &'a str,
    final_balance: Decimal,
    final_equity: Decimal,
    report: &'a SessionReport,
    strategies: &'a HashMap<String, StrategyStats>,
}

/// One strategy's line in the status block.
#[derive(Debug, Clone)]
pub struct StrategyLine {
    pub name: String,
    pub open: usize,
    pub stats: StrategyStats,
}

/// Bot statistics.
#[derive(Debug, Clone)]
pub struct BotStats {
    pub uptime_secs: i64,
    pub symbol: String,
    pub balance: Decimal,
    pub equity: Decimal,
    pub margin_level: Option<Decimal>,
    pub open_positions: usize,
    pub open_risk: Decimal,
    pub max_total_risk: Decimal,
    pub daily_pnl: Decimal,
    pub daily_loss_limit: Decimal,
    pub day_start_balance: Decimal,
    pub breaker: BreakerState,
    pub strategies: Vec<StrategyLine>,
}

impl std::fmt::Display for BotStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        writeln!(f, "=== Bot Status ({}) ===", self.symbol)?;
        writeln!(f, "Uptime:     {}", format_uptime(self.uptime_secs))?;
        writeln!(
            f,
            "Balance:    ${:.2} | Equity: ${:.2}",
            self.balance, self.equity
        )?;
        match self.margin_level {
            Some(level) => writeln!(f, "Margin:     {:.0}%", level)?,
            None => writeln!(f, "Margin:     n/a")?,
        }
        writeln!(
            f,
            "Open:       {} positions | risk {:.2}% of {:.2}%",
            self.open_positions,
            self.open_risk * Decimal::ONE_HUNDRED,
            self.max_total_risk * Decimal::ONE_HUNDRED
        )?;
        writeln!(
            f,
            "Daily P&L:  ${:.2} (halt at -{:.1}% of ${:.2})",
            self.daily_pnl,
            self.daily_loss_limit * Decimal::ONE_HUNDRED,
            self.day_start_balance
        )?;
        writeln!(f, "Breaker:    {}", self.breaker)?;
        writeln!(
            f,
            "{:<20} {:>4} {:>4} {:>4} {:>4} {:>5} {:>5} {:>4} {:>4} {:>11}",
            "STRATEGY", "OPEN", "SIG", "ADM", "REJ", "FILL", "FAIL", "W", "L", "P&L"
        )?;
        for line in &self.strategies {
            writeln!(
                f,
                "{:<20} {:>4} {:>4} {:>4} {:>4} {:>5} {:>5} {:>4} {:>4} {:>10.2}",
                line.name,
                line.open,
                line.stats.signals,
                line.stats.admitted,
                line.stats.rejected,
                line.stats.filled,
                line.stats.failed,
                line.stats.wins,
                line.stats.losses,
                line.stats.realized_pnl
            )?;
        }
        Ok(())
    }
}

fn format_uptime(secs: i64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{h}h {m:02}m {s:02}s")
}
