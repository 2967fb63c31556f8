//! Market data access port.

use crate::domain::error::ScanError;
use crate::domain::kline::{KLine, RealtimeQuote};
use crate::domain::stock::Stock;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Source of daily candles, realtime quotes, and the stock universe.
///
/// Implementations surface transient source failures as
/// [`ScanError::DataUnavailable`]; retry policy belongs to a wrapping
/// adapter, and the per-call time bound to the caller.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Daily bars for `code` in ascending date order, bounds inclusive.
    /// An empty series is a valid answer for a range with no trading days.
    async fn fetch_klines(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<KLine>, ScanError>;

    /// Latest quote for `code`.
    async fn realtime(&self, code: &str) -> Result<RealtimeQuote, ScanError>;

    /// Every stock the source knows about, unfiltered.
    async fn list_stocks(&self) -> Result<Vec<Stock>, ScanError>;
}
