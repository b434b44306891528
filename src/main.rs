//! Multi-Strategy Scalping Bot
//!
//! Runs several strategy evaluators over one shared indicator stream and
//! arbitrates their signals through a risk gate with account-wide limits,
//! a daily-loss circuit breaker, and risk-based position sizing.

mod bot;
mod db;
mod indicators;
mod metrics;
mod models;
mod strategies;
mod terminal;
mod trading;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use crate::bot::Bot;
use crate::db::Database;
use crate::models::SymbolSpec;
use crate::terminal::{Broker, MarketFeed, PaperConfig, PaperTerminal};
use crate::trading::TradingConfig;

/// Multi-strategy scalping bot CLI.
#[derive(Parser)]
#[command(name = "multistrat")]
#[command(about = "Run a roster of scalping strategies against one shared risk budget", long_about = None)]
struct Cli {
    /// Journal database path
    #[arg(
        short,
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:./multistrat.db?mode=rwc"
    )]
    database: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the trading loop against the paper terminal
    Run {
        /// Built-in preset (conservative, hft)
        #[arg(short, long, default_value = "conservative")]
        mode: String,

        /// TOML config file; takes precedence over --mode
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the configured symbol
        #[arg(long, env = "SYMBOL")]
        symbol: Option<String>,

        /// CSV bar tape (time,open,high,low,close); omit for a random walk
        #[arg(long)]
        bars: Option<PathBuf>,

        /// Random-walk seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Random-walk length in one-minute bars
        #[arg(long, default_value = "5000")]
        tape_len: usize,

        /// Starting paper balance
        #[arg(short, long, default_value = "10000")]
        balance: f64,

        /// Paper spread in points
        #[arg(long, default_value = "2")]
        spread: f64,
    },

    /// Show the resolved configuration
    Config {
        /// Built-in preset (conservative, hft)
        #[arg(short, long, default_value = "conservative")]
        mode: String,

        /// TOML config file; takes precedence over --mode
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Show journal state from the last session
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Run {
            mode,
            config,
            symbol,
            bars,
            seed,
            tape_len,
            balance,
            spread,
        } => {
            let trading = resolve_config(&mode, config.as_deref(), symbol.as_deref())?;

            let paper = PaperConfig {
                initial_balance: Decimal::try_from(balance)?,
                spread_points: Decimal::try_from(spread)?,
                spec: default_spec(&trading.symbol),
            };

            let terminal = match &bars {
                Some(path) => {
                    info!(path = %path.display(), "Loading bar tape");
                    Arc::new(PaperTerminal::from_csv(path, paper)?)
                }
                None => {
                    info!(seed, bars = tape_len, "Generating random-walk tape");
                    let start = Utc::now() - chrono::Duration::minutes(tape_len as i64);
                    Arc::new(PaperTerminal::random_walk(
                        seed, tape_len, 2400.0, start, paper,
                    ))
                }
            };
            let feed: Arc<dyn MarketFeed> = terminal.clone();
            let broker: Arc<dyn Broker> = terminal.clone();

            let mut bot = Bot::new(trading.clone(), feed, broker, &cli.database).await?;
            bot.initialize().await?;

            println!("\n=== Multi-Strategy Scalping Bot ===");
            println!("Symbol:     {}", trading.symbol);
            println!("Strategies: {}", trading.strategies.len());
            println!("Tick:       {}ms", trading.tick_interval_ms);
            println!("Balance:    ${:.2}", balance);
            println!("Tape:       {} bars", terminal.bars_remaining());
            println!("\nThis is SIMULATED trading - no real money involved.");
            println!("Press Ctrl+C to stop.\n");

            if let Err(e) = bot.run().await {
                tracing::error!(error = %e, "Bot error");
            }

            // Final stats
            println!("\n{}", bot.status().await);
            println!("{}", bot.session_report());
        }

        Commands::Config { mode, config } => {
            let trading = resolve_config(&mode, config.as_deref(), None)?;
            print_config(&trading);
        }

        Commands::Status => {
            let db = Database::new(&cli.database).await?;

            let Some(latest) = db.latest_equity().await? else {
                println!("No journal yet. Run 'multistrat run' to start a session.");
                return Ok(());
            };

            let days = db.get_daily_summaries(7).await?;
            let positions = db.get_open_positions().await?;
            let orders = db.get_recent_orders(10).await?;
            let max_dd = db.calculate_max_drawdown().await.unwrap_or(0.0);

            println!("\n=== Account ===");
            println!("As Of:          {}", latest.timestamp);
            println!("Balance:        ${:.2}", latest.balance);
            println!("Equity:         ${:.2}", latest.equity);
            println!("Open Risk:      {:.2}%", latest.open_risk * 100.0);
            println!("Open Positions: {}", latest.open_positions);
            println!("Daily P&L:      ${:.2}", latest.daily_pnl);
            println!("Max Drawdown:   {:.2}%", max_dd * 100.0);

            if !days.is_empty() {
                println!("\n=== Recent Days ===");
                println!(
                    "{:<12} {:>10} {:>10} {:>7} {:>5} {:>7} {:>7}",
                    "DAY", "START", "P&L", "TRADES", "WINS", "LOSSES", "HALTED"
                );
                for day in &days {
                    println!(
                        "{:<12} {:>10.2} {:>10.2} {:>7} {:>5} {:>7} {:>7}",
                        day.day,
                        day.start_balance,
                        day.realized_pnl,
                        day.trades,
                        day.wins,
                        day.losses,
                        if day.halted { "yes" } else { "no" }
                    );
                }
            }

            if !positions.is_empty() {
                println!("\n=== Open Positions ===");
                for pos in &positions {
                    println!(
                        "  #{} {} {} {:.2} lots @ {:.2} (SL {:.2} / TP {:.2})",
                        pos.ticket,
                        pos.strategy,
                        pos.direction,
                        pos.volume,
                        pos.entry_price,
                        pos.stop_loss,
                        pos.take_profit
                    );
                }
            }

            if !orders.is_empty() {
                println!("\n=== Recent Orders ===");
                for order in &orders {
                    println!(
                        "  {} {:<18} {:<5} {:>6.2} lots  {:<8} {}",
                        truncate(&order.id, 8),
                        order.strategy,
                        order.direction,
                        order.volume,
                        order.status,
                        order.reason.as_deref().unwrap_or("-")
                    );
                }
            }
        }
    }

    Ok(())
}

/// Resolve the trading configuration from a file or a built-in preset and
/// validate it before the bot sees it.
fn resolve_config(mode: &str, path: Option<&Path>, symbol: Option<&str>) -> Result<TradingConfig> {
    let mut config = match path {
        Some(path) => TradingConfig::from_toml(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => TradingConfig::preset(mode).ok_or_else(|| {
            anyhow::anyhow!("unknown mode '{mode}' (expected 'conservative' or 'hft')")
        })?,
    };

    if let Some(symbol) = symbol {
        config.symbol = symbol.to_string();
    }

    config.validate()?;
    Ok(config)
}

/// Contract spec handed to the paper terminal. Gold-flavored defaults:
/// 0.01 point, $1 per point per lot.
fn default_spec(symbol: &str) -> SymbolSpec {
    SymbolSpec {
        symbol: symbol.to_string(),
        point: dec!(0.01),
        tick_value: dec!(1),
        volume_step: dec!(0.01),
        volume_min: dec!(0.01),
        volume_max: dec!(200),
        margin_per_lot: dec!(2400),
    }
}

fn print_config(config: &TradingConfig) {
    println!("\n=== Trading Configuration ===\n");
    println!("Symbol:            {}", config.symbol);
    println!("Tick Interval:     {}ms", config.tick_interval_ms);
    println!("Snapshot Timeout:  {}ms", config.snapshot_timeout_ms);
    println!("Lookback:          {} bars", config.lookback_bars);
    println!("Summary Every:     {}s", config.summary_interval_secs);
    println!("Flatten On Exit:   {}", config.flatten_on_exit);

    let risk = &config.risk;
    println!("\nRisk Limits:");
    println!("  Max Open Positions: {}", risk.max_open_positions);
    println!("  Max Total Risk:     {}%", risk.max_total_risk * dec!(100));
    println!("  Daily Loss Limit:   {}%", risk.daily_loss_limit * dec!(100));
    println!("  Min Free Margin:    {}%", risk.min_free_margin * dec!(100));
    println!("  Margin Call Level:  {}%", risk.margin_call_level);
    println!("  Max Volume:         {} lots", risk.max_volume);

    println!("\nStrategies (priority order):");
    println!(
        "  {:<18} {:<18} {:>6} {:>7} {:>7} {:>4} {:>10}",
        "NAME", "KIND", "RISK%", "STOP", "TARGET", "MAX", "COOLDOWN"
    );
    for params in &config.strategies {
        println!(
            "  {:<18} {:<18} {:>6} {:>7} {:>7} {:>4} {:>8}ms",
            params.name,
            params.kind.as_str(),
            params.risk_per_trade * dec!(100),
            params.stop_points,
            params.target_points,
            params.max_positions,
            params.cooldown_ms
        );
    }
}

/// Truncate a string with ellipsis if too long.
fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        format!("{}...", &s[..max_len - 3])
    }
}
