//! CSV directory market data adapter.
//!
//! Layout: one `<code>.csv` per stock holding daily bars, plus a
//! `stocks.csv` (`code,name[,last_tested]`) listing index. Realtime quotes
//! are derived from the most recent bar on file.

use crate::domain::error::ScanError;
use crate::domain::kline::{KLine, RealtimeQuote};
use crate::domain::stock::Stock;
use crate::ports::market_data::MarketData;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use csv::StringRecord;
use std::fs;
use std::path::PathBuf;

const STOCKS_FILE: &str = "stocks.csv";
const KLINE_COLUMNS: usize = 11;

pub struct CsvMarketData {
    dir: PathBuf,
}

impl CsvMarketData {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn kline_path(&self, code: &str) -> PathBuf {
        self.dir.join(format!("{code}.csv"))
    }

    /// Full series for one stock, ascending and deduplicated by date.
    fn read_all_klines(&self, code: &str) -> Result<Vec<KLine>, ScanError> {
        let path = self.kline_path(code);
        let content = fs::read_to_string(&path).map_err(|err| ScanError::DataUnavailable {
            code: code.to_string(),
            reason: format!("{}: {err}", path.display()),
        })?;

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let record = row.map_err(|err| parse_error(code, line, &err.to_string()))?;
            bars.push(parse_bar(code, line, &record)?);
        }
        bars.sort_by_key(|bar| bar.date);
        bars.dedup_by_key(|bar| bar.date);
        Ok(bars)
    }

    fn read_listing(&self) -> Result<Vec<Stock>, ScanError> {
        let path = self.dir.join(STOCKS_FILE);
        let content = fs::read_to_string(&path).map_err(|err| ScanError::Database {
            reason: format!("listing index {}: {err}", path.display()),
        })?;

        let mut reader = csv::Reader::from_reader(content.as_bytes());
        let mut stocks = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let record = row.map_err(|err| ScanError::Database {
                reason: format!("{STOCKS_FILE} row {}: {err}", line + 2),
            })?;
            let code = record.get(0).unwrap_or("").trim();
            if code.is_empty() {
                continue;
            }
            let name = record.get(1).unwrap_or("").trim();
            let mut stock = if name.is_empty() {
                Stock::unnamed(code)
            } else {
                Stock::new(code, name)
            };
            stock.last_tested = record
                .get(2)
                .and_then(|value| NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok());
            stocks.push(stock);
        }
        Ok(stocks)
    }

    fn lookup_name(&self, code: &str) -> Option<String> {
        let listing = self.read_listing().ok()?;
        listing
            .into_iter()
            .find(|stock| stock.code == code)
            .map(|stock| stock.name)
    }
}

fn parse_error(code: &str, line: usize, reason: &str) -> ScanError {
    // +2: line 1 is the header, records count from the line after it.
    ScanError::DataUnavailable {
        code: code.to_string(),
        reason: format!("row {}: {reason}", line + 2),
    }
}

fn parse_bar(code: &str, line: usize, record: &StringRecord) -> Result<KLine, ScanError> {
    let number = |idx: usize, name: &str| -> Result<f64, ScanError> {
        record
            .get(idx)
            .ok_or_else(|| parse_error(code, line, &format!("missing {name} column")))?
            .trim()
            .parse()
            .map_err(|err| parse_error(code, line, &format!("{name}: {err}")))
    };

    if record.len() < KLINE_COLUMNS {
        return Err(parse_error(
            code,
            line,
            &format!("expected {KLINE_COLUMNS} columns, found {}", record.len()),
        ));
    }

    let date_text = record
        .get(0)
        .ok_or_else(|| parse_error(code, line, "missing date column"))?;
    let date = NaiveDate::parse_from_str(date_text.trim(), "%Y-%m-%d")
        .map_err(|err| parse_error(code, line, &format!("date: {err}")))?;

    Ok(KLine {
        date,
        open: number(1, "open")?,
        high: number(2, "high")?,
        low: number(3, "low")?,
        close: number(4, "close")?,
        volume: number(5, "volume")?,
        amount: number(6, "amount")?,
        amplitude_pct: number(7, "amplitude_pct")?,
        change_pct: number(8, "change_pct")?,
        change_amount: number(9, "change_amount")?,
        turnover_pct: number(10, "turnover_pct")?,
    })
}

#[async_trait]
impl MarketData for CsvMarketData {
    async fn fetch_klines(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<KLine>, ScanError> {
        let bars = self.read_all_klines(code)?;
        Ok(bars
            .into_iter()
            .filter(|bar| bar.date >= start && bar.date <= end)
            .collect())
    }

    async fn realtime(&self, code: &str) -> Result<RealtimeQuote, ScanError> {
        let bars = self.read_all_klines(code)?;
        let last = bars.last().ok_or_else(|| ScanError::DataUnavailable {
            code: code.to_string(),
            reason: "no bars on file".into(),
        })?;
        let name = self
            .lookup_name(code)
            .unwrap_or_else(|| code.to_string());
        Ok(RealtimeQuote::from_latest_bar(code, &name, last, Utc::now()))
    }

    async fn list_stocks(&self) -> Result<Vec<Stock>, ScanError> {
        self.read_listing()
    }
}
