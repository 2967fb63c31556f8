//! Retry decorator for flaky market data sources.

use crate::domain::error::ScanError;
use crate::domain::kline::{KLine, RealtimeQuote};
use crate::domain::stock::Stock;
use crate::ports::market_data::MarketData;
use async_trait::async_trait;
use chrono::NaiveDate;
use futures::future::BoxFuture;
use std::time::Duration;

/// Wraps any provider with bounded retries on transient failures.
///
/// Only [`ScanError::DataUnavailable`] is retried; every other error is
/// final. Backoff is linear: `base_delay`, `2 * base_delay`, and so on.
/// The per-stock time bound is the engine's, wrapped around the whole
/// call chain including these retries.
pub struct RetryingMarketData<P> {
    inner: P,
    max_attempts: u32,
    base_delay: Duration,
}

impl<P> RetryingMarketData<P> {
    pub fn new(inner: P) -> Self {
        Self::with_policy(inner, 3, Duration::from_millis(500))
    }

    pub fn with_policy(inner: P, max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }
}

impl<P: MarketData> RetryingMarketData<P> {
    async fn with_retries<'a, T: Send>(
        &self,
        mut call: impl FnMut() -> BoxFuture<'a, Result<T, ScanError>> + Send,
    ) -> Result<T, ScanError> {
        let mut attempt: u32 = 1;
        loop {
            match call().await {
                Err(ScanError::DataUnavailable { code, reason }) if attempt < self.max_attempts => {
                    tracing::debug!(
                        code = %code,
                        attempt,
                        error = %reason,
                        "transient provider failure, retrying"
                    );
                    tokio::time::sleep(self.base_delay * attempt).await;
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl<P: MarketData> MarketData for RetryingMarketData<P> {
    async fn fetch_klines(
        &self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<KLine>, ScanError> {
        self.with_retries(|| self.inner.fetch_klines(code, start, end))
            .await
    }

    async fn realtime(&self, code: &str) -> Result<RealtimeQuote, ScanError> {
        self.with_retries(|| self.inner.realtime(code)).await
    }

    async fn list_stocks(&self) -> Result<Vec<Stock>, ScanError> {
        self.with_retries(|| self.inner.list_stocks()).await
    }
}
