//! SQLite-backed market data provider.
//!
//! Two tables: `stocks` is the listing index, `klines` holds one row per
//! stock per trading day. Dates are stored as `%Y-%m-%d` text so ordering
//! and range predicates work lexically.

use crate::domain::error::ScanError;
use crate::domain::kline::{KLine, RealtimeQuote};
use crate::domain::stock::Stock;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data::MarketData;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection};

const BAR_COLUMNS: &str = "date, open, high, low, close, volume, amount, \
                           amplitude_pct, change_pct, change_amount, turnover_pct";

pub struct SqliteMarketData {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> ScanError {
    ScanError::Database {
        reason: e.to_string(),
    }
}

fn sql_err(e: rusqlite::Error) -> ScanError {
    ScanError::Database {
        reason: e.to_string(),
    }
}

fn bar_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<KLine> {
    let date_str: String = row.get(0)?;
    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(KLine {
        date,
        open: row.get(1)?,
        high: row.get(2)?,
        low: row.get(3)?,
        close: row.get(4)?,
        volume: row.get(5)?,
        amount: row.get(6)?,
        amplitude_pct: row.get(7)?,
        change_pct: row.get(8)?,
        change_amount: row.get(9)?,
        turnover_pct: row.get(10)?,
    })
}

impl SqliteMarketData {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, ScanError> {
        let path = config
            .get_string("data", "sqlite_path")
            .ok_or_else(|| ScanError::ConfigMissing {
                section: "data".into(),
                key: "sqlite_path".into(),
            })?;
        let pool_size = config.get_int("data", "pool_size", 4) as u32;
        Self::open(&path, pool_size)
    }

    pub fn open<P: AsRef<std::path::Path>>(path: P, pool_size: u32) -> Result<Self, ScanError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .build(manager)
            .map_err(pool_err)?;
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, ScanError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;
        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), ScanError> {
        let conn = self.pool.get().map_err(pool_err)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS stocks (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                last_tested TEXT
            );
            CREATE TABLE IF NOT EXISTS klines (
                code TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                amount REAL NOT NULL,
                amplitude_pct REAL NOT NULL,
                change_pct REAL NOT NULL,
                change_amount REAL NOT NULL,
                turnover_pct REAL NOT NULL,
                PRIMARY KEY (code, date)
            );
            CREATE INDEX IF NOT EXISTS idx_klines_date ON klines(date);",
        )
        .map_err(sql_err)?;
        Ok(())
    }

    /// Upserts listing rows. Used by import tooling and tests.
    pub fn insert_stocks(&self, stocks: &[Stock]) -> Result<(), ScanError> {
        let mut conn = self.pool.get().map_err(pool_err)?;
        let tx = conn.transaction().map_err(sql_err)?;
        for stock in stocks {
            tx.execute(
                "INSERT OR REPLACE INTO stocks (code, name, last_tested) VALUES (?1, ?2, ?3)",
                params![
                    stock.code,
                    stock.name,
                    stock
                        .last_tested
                        .map(|d| d.format("%Y-%m-%d").to_string()),
                ],
            )
            .map_err(sql_err)?;
        }
        tx.commit().map_err(sql_err)?;
        Ok(())
    }

    /// Upserts daily bars for one stock; same code and date replaces.
    pub fn insert_klines(&self, code: &str, bars: &[KLine]) -> Result<(), ScanError> {
        let mut conn = self.pool.get().map_err(pool_err)?;
        let tx = conn.transaction().map_err(sql_err)?;
        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO klines
                 (code, date, open, high, low, close, volume, amount,
                  amplitude_pct, change_pct, change_amount, turnover_pct)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    code,
                    bar.date.format("%Y-%m-%d").to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                    bar.amount,
                    bar.amplitude_pct,
                    bar.change_pct,
                    bar.change_amount,
                    bar.turnover_pct,
                ],
            )
            .map_err(sql_err)?;
        }
        tx.commit().map_err(sql_err)?;
        Ok(())
    }

    fn bar_count(conn: &Connection, code: &str) -> Result<i64, ScanError> {
        conn.query_row(
            "SELECT COUNT(*) FROM klines WHERE code = ?1",
            params![code],
            |row| row.get(0),
        )
        .map_err(sql_err)
    }

    fn latest_bar(conn: &Connection, code: &str) -> Result<Option<KLine>, ScanError> {
        let query =
            format!("SELECT {BAR_COLUMNS} FROM klines WHERE code = ?1 ORDER BY date DESC LIMIT 1");
        let mut stmt = conn.prepare(&query).map_err(sql_err)?;
        let mut rows = stmt.query_map(params![code], bar_from_row).map_err(sql_err)?;
        match rows.next() {
            Some(row) => Ok(Some(row.map_err(sql_err)?)),
            None => Ok(None),
        }
    }

    fn stock_name(conn: &Connection, code: &str) -> Option<String> {
        conn.query_row(
            "SELECT name FROM stocks WHERE code = ?1",
            params![code],
            |row| row.get(0),
        )
        .ok()
    }
}

#[async_trait]
impl MarketData for SqliteMarketData {
    async fn fetch_klines(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<KLine>, ScanError> {
        let conn = self.pool.get().map_err(pool_err)?;

        let query = format!(
            "SELECT {BAR_COLUMNS} FROM klines
             WHERE code = ?1 AND date >= ?2 AND date <= ?3
             ORDER BY date ASC"
        );
        let mut stmt = conn.prepare(&query).map_err(sql_err)?;
        let rows = stmt
            .query_map(
                params![
                    code,
                    start.format("%Y-%m-%d").to_string(),
                    end.format("%Y-%m-%d").to_string(),
                ],
                bar_from_row,
            )
            .map_err(sql_err)?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(row.map_err(sql_err)?);
        }

        // A known code with no bars in range is an empty series; a code
        // with no bars at all is indistinguishable from a typo.
        if bars.is_empty() && Self::bar_count(&conn, code)? == 0 {
            return Err(ScanError::DataUnavailable {
                code: code.to_string(),
                reason: "no bars on file".into(),
            });
        }

        Ok(bars)
    }

    async fn realtime(&self, code: &str) -> Result<RealtimeQuote, ScanError> {
        let conn = self.pool.get().map_err(pool_err)?;

        let bar = Self::latest_bar(&conn, code)?.ok_or_else(|| ScanError::DataUnavailable {
            code: code.to_string(),
            reason: "no bars on file".into(),
        })?;
        let name = Self::stock_name(&conn, code).unwrap_or_else(|| code.to_string());

        Ok(RealtimeQuote::from_latest_bar(code, &name, &bar, Utc::now()))
    }

    async fn list_stocks(&self) -> Result<Vec<Stock>, ScanError> {
        let conn = self.pool.get().map_err(pool_err)?;

        let mut stmt = conn
            .prepare("SELECT code, name, last_tested FROM stocks ORDER BY code")
            .map_err(sql_err)?;
        let rows = stmt
            .query_map([], |row| {
                let last_tested: Option<String> = row.get(2)?;
                Ok(Stock {
                    code: row.get(0)?,
                    name: row.get(1)?,
                    last_tested: last_tested
                        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
                })
            })
            .map_err(sql_err)?;

        let mut stocks = Vec::new();
        for row in rows {
            stocks.push(row.map_err(sql_err)?);
        }

        Ok(stocks)
    }
}
