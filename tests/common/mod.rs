#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use stockscan::domain::error::ScanError;
use stockscan::domain::kline::{KLine, RealtimeQuote};
use stockscan::domain::stock::Stock;
use stockscan::ports::MarketData;
use tokio::sync::Semaphore;

/// Market data mock with per-code canned bars, failures, and delays.
///
/// `entered` gains one permit each time a fetch begins, so tests can
/// synchronize on a worker being inside a fetch; an optional `gate`
/// semaphore holds fetches open until the test releases them.
pub struct MockProvider {
    pub bars: HashMap<String, Vec<KLine>>,
    pub errors: HashMap<String, String>,
    pub delays: HashMap<String, Duration>,
    pub listing: Vec<Stock>,
    pub gate: Option<Arc<Semaphore>>,
    pub entered: Arc<Semaphore>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            bars: HashMap::new(),
            errors: HashMap::new(),
            delays: HashMap::new(),
            listing: Vec::new(),
            gate: None,
            entered: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<KLine>) -> Self {
        self.bars.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }

    pub fn with_delay(mut self, code: &str, delay: Duration) -> Self {
        self.delays.insert(code.to_string(), delay);
        self
    }

    pub fn with_listing(mut self, listing: Vec<Stock>) -> Self {
        self.listing = listing;
        self
    }

    pub fn with_gate(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketData for MockProvider {
    async fn fetch_klines(
        &self,
        code: &str,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<Vec<KLine>, ScanError> {
        self.entered.add_permits(1);
        if let Some(gate) = &self.gate {
            let permit = gate.acquire().await;
            drop(permit);
        }
        if let Some(delay) = self.delays.get(code) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(reason) = self.errors.get(code) {
            return Err(ScanError::DataUnavailable {
                code: code.to_string(),
                reason: reason.clone(),
            });
        }
        self.bars
            .get(code)
            .cloned()
            .ok_or_else(|| ScanError::DataUnavailable {
                code: code.to_string(),
                reason: "no bars on file".into(),
            })
    }

    async fn realtime(&self, code: &str) -> Result<RealtimeQuote, ScanError> {
        let bars = self
            .bars
            .get(code)
            .filter(|bars| !bars.is_empty())
            .ok_or_else(|| ScanError::DataUnavailable {
                code: code.to_string(),
                reason: "no bars on file".into(),
            })?;
        Ok(RealtimeQuote::from_latest_bar(
            code,
            code,
            &bars[bars.len() - 1],
            Utc::now(),
        ))
    }

    async fn list_stocks(&self) -> Result<Vec<Stock>, ScanError> {
        Ok(self.listing.clone())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(date: NaiveDate, close: f64, volume: f64) -> KLine {
    KLine {
        date,
        open: close - 0.5,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume,
        amount: close * volume,
        amplitude_pct: 2.0,
        change_pct: 0.5,
        change_amount: 0.05,
        turnover_pct: 1.5,
    }
}

/// `count` bars ending today, one per calendar day, all at `close`.
pub fn flat_series(count: usize, close: f64) -> Vec<KLine> {
    let today = Utc::now().date_naive();
    (0..count)
        .map(|i| {
            make_bar(
                today - chrono::Duration::days((count - 1 - i) as i64),
                close,
                1_000_000.0,
            )
        })
        .collect()
}

/// 39 quiet bars then a closing high on triple volume, ending today.
/// Fires the bundled volume-breakout strategy (id 3) and is long enough
/// for every indicator.
pub fn breakout_series() -> Vec<KLine> {
    let mut bars = flat_series(40, 100.0);
    let last = bars.last_mut().unwrap();
    last.close = 105.0;
    last.high = 106.0;
    last.volume = 3_000_000.0;
    last.amount = 105.0 * 3_000_000.0;
    bars
}
