//! Application service tying catalog, engine, provider, and record store
//! together behind the operations the CLI exposes.

use crate::domain::backtest::{self, BacktestParams, TestResult};
use crate::domain::direction::Direction;
use crate::domain::error::ScanError;
use crate::domain::execution::{ExecutionRecord, ExecutionResult, ExecutionStatus};
use crate::domain::indicator::IndicatorParams;
use crate::domain::kline::RealtimeQuote;
use crate::domain::stock::Stock;
use crate::domain::strategy::{Strategy, StrategyCatalog};
use crate::domain::universe::filter_tradable;
use crate::engine::{Engine, EngineConfig, RunHandle, RunId};
use crate::ports::{MarketData, RecordStore};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

/// Calendar margins around a backtest anchor, sized so the 30 and 15
/// trading-day windows fit after weekends and holidays are dropped.
const BACKTEST_DAYS_BEFORE: i64 = 90;
const BACKTEST_DAYS_AFTER: i64 = 45;

pub struct ScanService {
    catalog: StrategyCatalog,
    provider: Arc<dyn MarketData>,
    store: Arc<dyn RecordStore>,
    engine: Engine,
    backtest_params: BacktestParams,
}

impl ScanService {
    pub fn new(
        catalog: StrategyCatalog,
        provider: Arc<dyn MarketData>,
        store: Arc<dyn RecordStore>,
        indicator_params: IndicatorParams,
        engine_config: EngineConfig,
        backtest_params: BacktestParams,
    ) -> Self {
        let engine = Engine::new(
            Arc::clone(&provider),
            Arc::clone(&store),
            indicator_params,
            engine_config,
        );
        ScanService {
            catalog,
            provider,
            store,
            engine,
            backtest_params,
        }
    }

    /// Starts a strategy run. With explicit `codes` the universe is those
    /// codes, names resolved from the provider listing where possible; with
    /// `None` it is the full listing after tradability filtering.
    pub async fn run_strategy(
        &self,
        strategy_id: u32,
        codes: Option<Vec<String>>,
    ) -> Result<RunHandle, ScanError> {
        let strategy = self.catalog.get(strategy_id)?;
        let universe = match codes {
            Some(codes) => self.resolve_codes(codes).await,
            None => filter_tradable(self.provider.list_stocks().await?),
        };
        self.engine.start(strategy, universe).await
    }

    async fn resolve_codes(&self, codes: Vec<String>) -> Vec<Stock> {
        let listed: HashMap<String, Stock> = match self.provider.list_stocks().await {
            Ok(stocks) => stocks
                .into_iter()
                .map(|stock| (stock.code.clone(), stock))
                .collect(),
            Err(err) => {
                tracing::debug!(error = %err, "listing unavailable, codes go unnamed");
                HashMap::new()
            }
        };
        codes
            .into_iter()
            .map(|code| {
                listed
                    .get(&code)
                    .cloned()
                    .unwrap_or_else(|| Stock::unnamed(code))
            })
            .collect()
    }

    pub async fn status(&self, run_id: RunId) -> Result<ExecutionStatus, ScanError> {
        self.engine.status(run_id).await
    }

    pub async fn cancel(&self, run_id: RunId) -> Result<(), ScanError> {
        self.engine.cancel(run_id).await
    }

    pub async fn result(&self, run_id: RunId) -> Result<ExecutionResult, ScanError> {
        self.engine.result(run_id).await
    }

    /// Scores a directional prediction for `code` anchored at `anchor`.
    pub async fn run_backtest(
        &self,
        code: &str,
        anchor: NaiveDate,
        predicted: Direction,
    ) -> Result<TestResult, ScanError> {
        let start = anchor - chrono::Duration::days(BACKTEST_DAYS_BEFORE);
        let end = anchor + chrono::Duration::days(BACKTEST_DAYS_AFTER);
        let klines = self.provider.fetch_klines(code, start, end).await?;
        backtest::evaluate(code, &klines, anchor, predicted, &self.backtest_params)
    }

    pub fn list_records(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<ExecutionRecord>, ScanError> {
        self.store.list(range)
    }

    pub fn load_record(&self, file_name: &str) -> Result<ExecutionResult, ScanError> {
        self.store.load(file_name)
    }

    pub fn strategies(&self) -> Vec<Strategy> {
        self.catalog.list()
    }

    pub async fn realtime(&self, code: &str) -> Result<RealtimeQuote, ScanError> {
        self.provider.realtime(code).await
    }
}
