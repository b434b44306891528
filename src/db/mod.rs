//! SQLite journal for orders, positions, and account history.
//!
//! Everything the bot decides or learns from the terminal lands here:
//! - Orders, from admission through their dispatch outcome
//! - Positions, opened and closed, with their risk attribution
//! - Equity curve samples for drawdown tracking
//! - One summary row per trading day

use anyhow::{Context, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::models::PositionRecord;

/// Database connection pool for the trade journal.
pub struct Database {
    pool: SqlitePool,
}

/// Journaled order record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredOrder {
    pub id: String,
    pub strategy: String,
    pub direction: String,
    pub volume: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub status: String,
    pub reason: Option<String>,
    pub fill_price: Option<f64>,
    pub ticket: Option<i64>,
    pub created_at: String,
}

/// Journaled position record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredPosition {
    pub ticket: i64,
    pub strategy: String,
    pub direction: String,
    pub volume: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk_fraction: f64,
    pub status: String,
    pub opened_at: String,
    pub closed_at: Option<String>,
    pub close_price: Option<f64>,
    pub close_reason: Option<String>,
    pub profit: Option<f64>,
}

/// Equity curve sample.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EquityPoint {
    pub id: i64,
    pub timestamp: String,
    pub balance: f64,
    pub equity: f64,
    pub open_risk: f64,
    pub open_positions: i64,
    pub daily_pnl: f64,
}

/// One row per trading day.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailySummaryRow {
    pub day: String,
    pub start_balance: f64,
    pub realized_pnl: f64,
    pub trades: i64,
    pub wins: i64,
    pub losses: i64,
    pub halted: bool,
    pub updated_at: String,
}

fn db_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

impl Database {
    /// Create a new database connection and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run all database migrations.
    async fn run_migrations(&self) -> Result<()> {
        // Orders, journaled before dispatch
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                strategy TEXT NOT NULL,
                direction TEXT NOT NULL,
                volume REAL NOT NULL,
                stop_loss REAL NOT NULL,
                take_profit REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                reason TEXT,
                fill_price REAL,
                ticket INTEGER,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Positions with risk attribution
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                ticket INTEGER PRIMARY KEY,
                strategy TEXT NOT NULL,
                direction TEXT NOT NULL,
                volume REAL NOT NULL,
                entry_price REAL NOT NULL,
                stop_loss REAL NOT NULL,
                take_profit REAL NOT NULL,
                risk_fraction REAL NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'open',
                opened_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                closed_at TEXT,
                close_price REAL,
                close_reason TEXT,
                profit REAL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Equity curve
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS equity_curve (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                balance REAL NOT NULL,
                equity REAL NOT NULL,
                open_risk REAL NOT NULL DEFAULT 0,
                open_positions INTEGER NOT NULL DEFAULT 0,
                daily_pnl REAL NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Daily summaries
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_summary (
                day TEXT PRIMARY KEY,
                start_balance REAL NOT NULL,
                realized_pnl REAL NOT NULL DEFAULT 0,
                trades INTEGER NOT NULL DEFAULT 0,
                wins INTEGER NOT NULL DEFAULT 0,
                losses INTEGER NOT NULL DEFAULT 0,
                halted INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_strategy ON orders(strategy)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_positions_status ON positions(status)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_equity_curve_time ON equity_curve(timestamp)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== Orders ====================

    /// Journal an admitted order before dispatch.
    pub async fn insert_order(
        &self,
        id: &str,
        strategy: &str,
        direction: &str,
        volume: Decimal,
        stop_loss: Decimal,
        take_profit: Decimal,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, strategy, direction, volume, stop_loss, take_profit, status)
            VALUES (?, ?, ?, ?, ?, ?, 'pending')
            "#,
        )
        .bind(id)
        .bind(strategy)
        .bind(direction)
        .bind(db_f64(volume))
        .bind(db_f64(stop_loss))
        .bind(db_f64(take_profit))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record the dispatch outcome of a journaled order.
    pub async fn update_order_status(
        &self,
        id: &str,
        status: &str,
        ticket: Option<i64>,
        fill_price: Option<f64>,
        reason: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders SET
                status = ?,
                ticket = COALESCE(?, ticket),
                fill_price = COALESCE(?, fill_price),
                reason = COALESCE(?, reason)
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(ticket)
        .bind(fill_price)
        .bind(reason)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get recent orders, newest first.
    pub async fn get_recent_orders(&self, limit: i64) -> Result<Vec<StoredOrder>> {
        sqlx::query_as::<_, StoredOrder>(
            "SELECT * FROM orders ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch orders")
    }

    // ==================== Positions ====================

    /// Journal a filled position.
    pub async fn open_position(&self, position: &PositionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO positions (
                ticket, strategy, direction, volume, entry_price,
                stop_loss, take_profit, risk_fraction, status, opened_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'open', ?)
            "#,
        )
        .bind(position.ticket as i64)
        .bind(&position.strategy)
        .bind(position.direction.to_string())
        .bind(db_f64(position.volume))
        .bind(db_f64(position.entry_price))
        .bind(db_f64(position.stop_loss))
        .bind(db_f64(position.take_profit))
        .bind(db_f64(position.risk_fraction))
        .bind(position.opened_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark a journaled position closed.
    pub async fn close_position(
        &self,
        ticket: u64,
        close_price: Decimal,
        profit: Decimal,
        reason: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE positions SET
                status = 'closed',
                closed_at = datetime('now'),
                close_price = ?,
                close_reason = ?,
                profit = ?
            WHERE ticket = ?
            "#,
        )
        .bind(db_f64(close_price))
        .bind(reason)
        .bind(db_f64(profit))
        .bind(ticket as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark a position closed when the terminal no longer knows it and no
    /// close details exist, e.g. it was closed by hand while offline.
    pub async fn mark_position_closed(&self, ticket: u64, reason: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE positions SET
                status = 'closed',
                closed_at = datetime('now'),
                close_reason = ?
            WHERE ticket = ? AND status = 'open'
            "#,
        )
        .bind(reason)
        .bind(ticket as i64)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get all open journaled positions.
    pub async fn get_open_positions(&self) -> Result<Vec<StoredPosition>> {
        sqlx::query_as::<_, StoredPosition>("SELECT * FROM positions WHERE status = 'open'")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch positions")
    }

    /// Look up one journaled position by terminal ticket.
    pub async fn get_position(&self, ticket: u64) -> Result<Option<StoredPosition>> {
        sqlx::query_as::<_, StoredPosition>("SELECT * FROM positions WHERE ticket = ?")
            .bind(ticket as i64)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch position")
    }

    // ==================== Equity Curve ====================

    /// Record an equity curve sample.
    pub async fn record_equity_point(
        &self,
        balance: Decimal,
        equity: Decimal,
        open_risk: Decimal,
        open_positions: usize,
        daily_pnl: Decimal,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO equity_curve (balance, equity, open_risk, open_positions, daily_pnl)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(db_f64(balance))
        .bind(db_f64(equity))
        .bind(db_f64(open_risk))
        .bind(open_positions as i64)
        .bind(db_f64(daily_pnl))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get recent equity curve points, newest first.
    pub async fn get_equity_curve(&self, limit: i64) -> Result<Vec<EquityPoint>> {
        sqlx::query_as::<_, EquityPoint>(
            "SELECT * FROM equity_curve ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch equity curve")
    }

    /// Latest equity sample, if any.
    pub async fn latest_equity(&self) -> Result<Option<EquityPoint>> {
        sqlx::query_as::<_, EquityPoint>("SELECT * FROM equity_curve ORDER BY id DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch equity point")
    }

    /// Calculate max drawdown over the stored equity curve.
    pub async fn calculate_max_drawdown(&self) -> Result<f64> {
        let points = self.get_equity_curve(1000).await?;

        if points.is_empty() {
            return Ok(0.0);
        }

        let mut peak = 0.0f64;
        let mut max_dd = 0.0f64;

        // Points are in DESC order, reverse for calculation
        for point in points.into_iter().rev() {
            if point.equity > peak {
                peak = point.equity;
            }
            if peak > 0.0 {
                let dd = (peak - point.equity) / peak;
                if dd > max_dd {
                    max_dd = dd;
                }
            }
        }

        Ok(max_dd)
    }

    // ==================== Daily Summary ====================

    /// Insert or refresh the row for one trading day.
    pub async fn upsert_daily_summary(
        &self,
        day: &str,
        start_balance: Decimal,
        realized_pnl: Decimal,
        trades: u32,
        wins: u32,
        losses: u32,
        halted: bool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_summary (day, start_balance, realized_pnl, trades, wins, losses, halted, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, datetime('now'))
            ON CONFLICT(day) DO UPDATE SET
                realized_pnl = excluded.realized_pnl,
                trades = excluded.trades,
                wins = excluded.wins,
                losses = excluded.losses,
                halted = excluded.halted,
                updated_at = datetime('now')
            "#,
        )
        .bind(day)
        .bind(db_f64(start_balance))
        .bind(db_f64(realized_pnl))
        .bind(trades as i64)
        .bind(wins as i64)
        .bind(losses as i64)
        .bind(halted)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get recent daily summaries, newest first.
    pub async fn get_daily_summaries(&self, limit: i64) -> Result<Vec<DailySummaryRow>> {
        sqlx::query_as::<_, DailySummaryRow>(
            "SELECT * FROM daily_summary ORDER BY day DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch daily summaries")
    }

    /// Get the connection pool (for advanced queries).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    // A shared in-memory URL would hand each pooled connection its own
    // database, so tests go through a throwaway file instead.
    fn temp_url() -> (std::path::PathBuf, String) {
        let path = std::env::temp_dir().join(format!("multistrat-test-{}.db", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}?mode=rwc", path.display());
        (path, url)
    }

    fn position(ticket: u64) -> PositionRecord {
        PositionRecord {
            ticket,
            strategy: "aggressive_scalp".to_string(),
            direction: Direction::Long,
            volume: dec!(0.5),
            entry_price: dec!(2400.02),
            stop_loss: dec!(2399.60),
            take_profit: dec!(2400.62),
            risk_fraction: dec!(0.003),
            opened_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_journal_round_trip() {
        let (path, url) = temp_url();
        let db = Database::new(&url).await.unwrap();

        // Order lifecycle
        db.insert_order("ord-1", "aggressive_scalp", "BUY", dec!(0.5), dec!(2399.60), dec!(2400.62))
            .await
            .unwrap();
        db.update_order_status("ord-1", "filled", Some(42), Some(2400.02), None)
            .await
            .unwrap();

        let orders = db.get_recent_orders(10).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, "filled");
        assert_eq!(orders[0].ticket, Some(42));

        // Position lifecycle
        db.open_position(&position(42)).await.unwrap();
        let open = db.get_open_positions().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].risk_fraction, 0.003);

        db.close_position(42, dec!(2399.60), dec!(-21), "stop_loss")
            .await
            .unwrap();
        assert!(db.get_open_positions().await.unwrap().is_empty());
        let stored = db.get_position(42).await.unwrap().unwrap();
        assert_eq!(stored.status, "closed");
        assert_eq!(stored.close_reason.as_deref(), Some("stop_loss"));

        // Equity curve and drawdown
        db.record_equity_point(dec!(10000), dec!(10000), dec!(0), 0, dec!(0))
            .await
            .unwrap();
        db.record_equity_point(dec!(9979), dec!(9900), dec!(0.003), 1, dec!(-21))
            .await
            .unwrap();
        db.record_equity_point(dec!(9979), dec!(9979), dec!(0), 0, dec!(-21))
            .await
            .unwrap();

        let latest = db.latest_equity().await.unwrap().unwrap();
        assert_eq!(latest.open_positions, 0);

        let dd = db.calculate_max_drawdown().await.unwrap();
        assert!((dd - 0.01).abs() < 1e-9);

        // Daily summary upsert
        db.upsert_daily_summary("2024-06-03", dec!(10000), dec!(-21), 1, 0, 1, false)
            .await
            .unwrap();
        db.upsert_daily_summary("2024-06-03", dec!(10000), dec!(-521), 2, 0, 2, true)
            .await
            .unwrap();

        let days = db.get_daily_summaries(5).await.unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].trades, 2);
        assert!(days[0].halted);

        drop(db);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_mark_position_closed_without_details() {
        let (path, url) = temp_url();
        let db = Database::new(&url).await.unwrap();

        db.open_position(&position(7)).await.unwrap();
        db.mark_position_closed(7, "manual").await.unwrap();

        let stored = db.get_position(7).await.unwrap().unwrap();
        assert_eq!(stored.status, "closed");
        assert_eq!(stored.close_reason.as_deref(), Some("manual"));
        assert_eq!(stored.profit, None);
        assert!(db.get_open_positions().await.unwrap().is_empty());

        drop(db);
        let _ = std::fs::remove_file(&path);
    }
}
