//! Paper terminal: replays a bar tape and simulates fills, protective
//! stops, and account margin.
//!
//! Each `snapshot` call serves one bar and advances the tape. Protective
//! levels are evaluated against the served bar's range before the quote is
//! built, so a position opened after seeing bar N can only be stopped out
//! by bar N+1 onward. Fills are idealized: orders fill at the current
//! quote, stops and targets at exactly their requested level. When a bar
//! touches both levels the stop wins.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde::Deserialize;

use super::types::{AccountState, BrokerError, FeedError, OrderRequest, OrderResult};
use super::{Broker, MarketFeed};
use crate::models::{
    Bar, ClosedPosition, CloseReason, Direction, MarketSnapshot, PositionRecord, Quote, SymbolSpec,
};

/// Paper account and market parameters.
#[derive(Debug, Clone)]
pub struct PaperConfig {
    pub initial_balance: Decimal,

    /// Fixed bid/ask spread in points
    pub spread_points: Decimal,

    pub spec: SymbolSpec,
}

#[derive(Debug)]
struct PaperState {
    tape: Vec<Bar>,
    cursor: usize,
    balance: Decimal,
    auto_trading: bool,
    next_ticket: u64,
    open: HashMap<u64, PositionRecord>,
    closed_buffer: Vec<ClosedPosition>,
    last_quote: Option<Quote>,
}

impl PaperState {
    /// Evaluate stop and target levels against one bar's range.
    fn process_triggers(&mut self, bar: &Bar, spec: &SymbolSpec) {
        let mut hits: Vec<(u64, Decimal, CloseReason)> = Vec::new();

        for position in self.open.values() {
            // NaN comparisons are false, so a malformed level never fires
            let sl = position.stop_loss.to_f64().unwrap_or(f64::NAN);
            let tp = position.take_profit.to_f64().unwrap_or(f64::NAN);

            let hit = match position.direction {
                Direction::Long => {
                    if bar.low <= sl {
                        Some((position.stop_loss, CloseReason::StopLoss))
                    } else if bar.high >= tp {
                        Some((position.take_profit, CloseReason::TakeProfit))
                    } else {
                        None
                    }
                }
                Direction::Short => {
                    if bar.high >= sl {
                        Some((position.stop_loss, CloseReason::StopLoss))
                    } else if bar.low <= tp {
                        Some((position.take_profit, CloseReason::TakeProfit))
                    } else {
                        None
                    }
                }
            };

            if let Some((price, reason)) = hit {
                hits.push((position.ticket, price, reason));
            }
        }

        for (ticket, price, reason) in hits {
            self.close_at(ticket, price, reason, bar.time, spec);
        }
    }

    fn close_at(
        &mut self,
        ticket: u64,
        price: Decimal,
        reason: CloseReason,
        time: DateTime<Utc>,
        spec: &SymbolSpec,
    ) {
        if let Some(position) = self.open.remove(&ticket) {
            let profit = position.pnl_at(price, spec);
            self.balance += profit;
            self.closed_buffer.push(ClosedPosition {
                position,
                close_price: price,
                profit,
                closed_at: time,
                reason,
            });
        }
    }

    /// Price a position would close at right now.
    fn exit_price(&self, direction: Direction) -> Option<Decimal> {
        let quote = self.last_quote?;
        Some(match direction {
            Direction::Long => quote.bid,
            Direction::Short => quote.ask,
        })
    }
}

/// Simulated terminal implementing both the feed and broker boundaries.
pub struct PaperTerminal {
    config: PaperConfig,
    state: Mutex<PaperState>,
}

#[derive(Debug, Deserialize)]
struct CsvBar {
    /// Unix seconds
    time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
}

impl PaperTerminal {
    pub fn new(tape: Vec<Bar>, config: PaperConfig) -> Self {
        let state = PaperState {
            tape,
            cursor: 0,
            balance: config.initial_balance,
            auto_trading: true,
            next_ticket: 1,
            open: HashMap::new(),
            closed_buffer: Vec::new(),
            last_quote: None,
        };
        Self {
            config,
            state: Mutex::new(state),
        }
    }

    /// Load a tape from a CSV file with a `time,open,high,low,close`
    /// header row, time in unix seconds.
    pub fn from_csv(path: impl AsRef<Path>, config: PaperConfig) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open bar file {}", path.display()))?;

        let mut tape = Vec::new();
        for (i, record) in reader.deserialize::<CsvBar>().enumerate() {
            let row = record.with_context(|| format!("bad bar at row {}", i + 1))?;
            let time = DateTime::from_timestamp(row.time, 0)
                .with_context(|| format!("bad timestamp {} at row {}", row.time, i + 1))?;
            tape.push(Bar {
                time,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
            });
        }
        anyhow::ensure!(!tape.is_empty(), "bar file {} is empty", path.display());

        Ok(Self::new(tape, config))
    }

    /// Generate a seeded random-walk tape of minute bars.
    pub fn random_walk(
        seed: u64,
        bars: usize,
        start_price: f64,
        start: DateTime<Utc>,
        config: PaperConfig,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut tape = Vec::with_capacity(bars);
        let mut price = start_price;

        for i in 0..bars {
            let drift: f64 = rng.gen_range(-0.0012..0.0012);
            let open = price;
            let close = open * (1.0 + drift);
            let wick_up: f64 = rng.gen_range(0.0..0.0006);
            let wick_down: f64 = rng.gen_range(0.0..0.0006);
            tape.push(Bar {
                time: start + Duration::minutes(i as i64),
                open,
                high: open.max(close) * (1.0 + wick_up),
                low: open.min(close) * (1.0 - wick_down),
                close,
            });
            price = close;
        }

        Self::new(tape, config)
    }

    /// Flip the terminal's AutoTrading switch.
    pub fn set_auto_trading(&self, enabled: bool) {
        self.state.lock().unwrap().auto_trading = enabled;
    }

    pub fn bars_remaining(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.tape.len().saturating_sub(state.cursor)
    }
}

#[async_trait]
impl MarketFeed for PaperTerminal {
    async fn snapshot(
        &self,
        symbol: &str,
        lookback: usize,
    ) -> Result<MarketSnapshot, FeedError> {
        if symbol != self.config.spec.symbol {
            return Err(FeedError::Connection(format!("unknown symbol {symbol}")));
        }

        let mut state = self.state.lock().unwrap();
        if state.cursor >= state.tape.len() {
            return Err(FeedError::Exhausted);
        }

        let bar = state.tape[state.cursor];
        state.process_triggers(&bar, &self.config.spec);

        let bid = Decimal::from_f64(bar.close)
            .ok_or_else(|| FeedError::Connection(format!("non-finite close at {}", bar.time)))?;
        let quote = Quote {
            time: bar.time,
            bid,
            ask: bid + self.config.spec.points_to_price(self.config.spread_points),
        };
        state.last_quote = Some(quote);
        state.cursor += 1;

        let end = state.cursor;
        let start = end.saturating_sub(lookback);
        Ok(MarketSnapshot {
            symbol: symbol.to_string(),
            quote,
            bars: state.tape[start..end].to_vec(),
        })
    }
}

#[async_trait]
impl Broker for PaperTerminal {
    async fn account(&self) -> Result<AccountState, BrokerError> {
        let state = self.state.lock().unwrap();
        let spec = &self.config.spec;

        let mut unrealized = Decimal::ZERO;
        let mut margin = Decimal::ZERO;
        for position in state.open.values() {
            if let Some(price) = state.exit_price(position.direction) {
                unrealized += position.pnl_at(price, spec);
            }
            margin += position.volume * spec.margin_per_lot;
        }

        let equity = state.balance + unrealized;
        Ok(AccountState {
            balance: state.balance,
            equity,
            margin,
            free_margin: equity - margin,
            currency: "USD".to_string(),
        })
    }

    async fn symbol_spec(&self, symbol: &str) -> Result<SymbolSpec, BrokerError> {
        if symbol != self.config.spec.symbol {
            return Err(BrokerError::Connection(format!("unknown symbol {symbol}")));
        }
        Ok(self.config.spec.clone())
    }

    async fn trading_permitted(&self) -> Result<bool, BrokerError> {
        Ok(self.state.lock().unwrap().auto_trading)
    }

    async fn submit(&self, request: &OrderRequest) -> Result<OrderResult, BrokerError> {
        let mut state = self.state.lock().unwrap();
        if !state.auto_trading {
            return Err(BrokerError::ExecutionDisabled);
        }

        let spec = &self.config.spec;
        if request.volume < spec.volume_min || request.volume > spec.volume_max {
            return Ok(OrderResult::Rejected {
                reason: format!("volume {} outside [{}, {}]", request.volume, spec.volume_min, spec.volume_max),
            });
        }

        let Some(quote) = state.last_quote else {
            return Ok(OrderResult::Rejected {
                reason: "no market price yet".to_string(),
            });
        };
        let price = match request.direction {
            Direction::Long => quote.ask,
            Direction::Short => quote.bid,
        };

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.open.insert(
            ticket,
            PositionRecord {
                ticket,
                strategy: request.comment.clone(),
                direction: request.direction,
                volume: request.volume,
                entry_price: price,
                stop_loss: request.stop_loss,
                take_profit: request.take_profit,
                // The risk ledger owns risk attribution
                risk_fraction: Decimal::ZERO,
                opened_at: quote.time,
            },
        );

        Ok(OrderResult::Filled { ticket, price })
    }

    async fn open_positions(&self) -> Result<Vec<PositionRecord>, BrokerError> {
        let state = self.state.lock().unwrap();
        Ok(state.open.values().cloned().collect())
    }

    async fn close(&self, ticket: u64) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        let position = state
            .open
            .get(&ticket)
            .ok_or_else(|| BrokerError::Connection(format!("unknown ticket {ticket}")))?;

        let price = state
            .exit_price(position.direction)
            .ok_or_else(|| BrokerError::Connection("no market price yet".to_string()))?;
        let time = state
            .last_quote
            .map(|q| q.time)
            .unwrap_or_else(Utc::now);

        state.close_at(ticket, price, CloseReason::Flatten, time, &self.config.spec);
        Ok(())
    }

    async fn drain_closed(&self) -> Result<Vec<ClosedPosition>, BrokerError> {
        let mut state = self.state.lock().unwrap();
        Ok(std::mem::take(&mut state.closed_buffer))
    }
}
