//! Concurrent strategy execution engine.
//!
//! One run fans a stock universe out to a pool of worker tasks that fetch
//! candles, compute indicators, and evaluate the strategy. A single driver
//! task is the only writer of run state; workers report outcomes over a
//! channel and never touch the shared counters directly.

pub mod speed;

use crate::domain::error::ScanError;
use crate::domain::execution::{
    ExecutionResult, ExecutionStatus, RESULT_SCHEMA_VERSION, RunState, final_state, progress_pct,
};
use crate::domain::indicator::{IndicatorParams, IndicatorSet};
use crate::domain::stock::{Stock, StockSignal};
use crate::domain::strategy::StrategyLogic;
use crate::ports::{MarketData, RecordStore};
use chrono::{DateTime, Utc};
use speed::Speedometer;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use uuid::Uuid;

/// Unique identifier of one run.
pub type RunId = Uuid;

/// Tunables for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Concurrent stock evaluations per run.
    pub worker_count: usize,
    /// Hard bound on one candle fetch. A stock that exceeds it counts as
    /// failed; the run carries on.
    pub fetch_timeout: Duration,
    /// Trailing window the live speed estimate averages over.
    pub speed_window: Duration,
    /// How far back the candle fetch reaches, in calendar days.
    pub lookback_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            worker_count: 16,
            fetch_timeout: Duration::from_secs(30),
            speed_window: Duration::from_secs(10),
            lookback_days: 365,
        }
    }
}

/// Mutable run state. Guarded by `RunShared::inner`; only the driver task
/// writes after start.
#[derive(Debug)]
struct RunInner {
    strategy_id: u32,
    start_time: DateTime<Utc>,
    total: usize,
    state: RunState,
    processed: usize,
    error_count: usize,
    current_stock: Option<String>,
    last_error: Option<String>,
    signals: Vec<StockSignal>,
    speedometer: Speedometer,
    /// Overall average speed, fixed at finalization.
    avg_speed: Option<f64>,
    result: Option<ExecutionResult>,
}

#[derive(Debug)]
struct RunShared {
    inner: RwLock<RunInner>,
    cancelled: AtomicBool,
    /// Carries the state into terminal; `wait` subscribes to it.
    state_tx: watch::Sender<RunState>,
}

/// Cloneable reference to one run.
#[derive(Debug, Clone)]
pub struct RunHandle {
    id: RunId,
    strategy_id: u32,
    shared: Arc<RunShared>,
}

impl RunHandle {
    fn new(strategy_id: u32, total: usize, speed_window: Duration) -> Self {
        let inner = RunInner {
            strategy_id,
            start_time: Utc::now(),
            total,
            state: RunState::Running,
            processed: 0,
            error_count: 0,
            current_stock: None,
            last_error: None,
            signals: Vec::new(),
            speedometer: Speedometer::new(speed_window, Instant::now()),
            avg_speed: None,
            result: None,
        };
        let (state_tx, _) = watch::channel(RunState::Running);
        RunHandle {
            id: Uuid::new_v4(),
            strategy_id,
            shared: Arc::new(RunShared {
                inner: RwLock::new(inner),
                cancelled: AtomicBool::new(false),
                state_tx,
            }),
        }
    }

    pub fn id(&self) -> RunId {
        self.id
    }

    pub fn strategy_id(&self) -> u32 {
        self.strategy_id
    }

    pub async fn state(&self) -> RunState {
        self.shared.inner.read().await.state
    }

    /// Snapshot of progress, speed, and ETA. Speed is the trailing-window
    /// estimate while running and the overall average once terminal; ETA
    /// is absent once terminal or whenever the speed is zero.
    pub async fn status(&self) -> ExecutionStatus {
        let inner = self.shared.inner.read().await;
        let (speed, eta_seconds) = if inner.state.is_terminal() {
            (inner.avg_speed.unwrap_or(0.0), None)
        } else {
            let now = Instant::now();
            let remaining = inner.total - inner.processed;
            (
                inner.speedometer.speed(now),
                inner.speedometer.eta_seconds(now, remaining),
            )
        };
        ExecutionStatus {
            state: inner.state,
            strategy_id: inner.strategy_id,
            start_time: inner.start_time,
            total_stocks: inner.total,
            processed_count: inner.processed,
            error_count: inner.error_count,
            current_stock: inner.current_stock.clone(),
            progress_pct: progress_pct(inner.processed, inner.total),
            speed,
            eta_seconds,
            last_error: inner.last_error.clone(),
        }
    }

    /// Requests a cooperative stop. In-flight stocks finish, queued ones
    /// are abandoned. Idempotent; a no-op once the run is terminal.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    /// Final result, available once the run reaches a terminal state.
    pub async fn result(&self) -> Result<ExecutionResult, ScanError> {
        let inner = self.shared.inner.read().await;
        inner
            .result
            .clone()
            .ok_or(ScanError::NotReady { run_id: self.id })
    }

    /// Resolves when the run reaches a terminal state. The record store
    /// write has been attempted by then.
    pub async fn wait(&self) {
        let mut rx = self.shared.state_tx.subscribe();
        // wait_for checks the current value before awaiting changes, and
        // the sender lives in shared state this handle keeps alive.
        let _ = rx.wait_for(|state| state.is_terminal()).await;
    }
}

/// Owns run bookkeeping and spawns the per-run driver and workers. One
/// engine serves many runs; at most one non-terminal run per strategy.
pub struct Engine {
    provider: Arc<dyn MarketData>,
    store: Arc<dyn RecordStore>,
    params: IndicatorParams,
    config: EngineConfig,
    runs: Mutex<HashMap<RunId, RunHandle>>,
}

impl Engine {
    pub fn new(
        provider: Arc<dyn MarketData>,
        store: Arc<dyn RecordStore>,
        params: IndicatorParams,
        config: EngineConfig,
    ) -> Self {
        Engine {
            provider,
            store,
            params,
            config,
            runs: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a run of `strategy` over `stocks` and returns immediately.
    /// Stocks are evaluated in queue order by however many workers the
    /// engine is configured for.
    pub async fn start(
        &self,
        strategy: Arc<dyn StrategyLogic>,
        stocks: Vec<Stock>,
    ) -> Result<RunHandle, ScanError> {
        let strategy_id = strategy.descriptor().id;
        let handle = {
            let mut runs = self.runs.lock().await;
            for existing in runs.values() {
                if existing.strategy_id() == strategy_id && !existing.state().await.is_terminal() {
                    return Err(ScanError::ConcurrentRun { strategy_id });
                }
            }
            let handle = RunHandle::new(strategy_id, stocks.len(), self.config.speed_window);
            runs.insert(handle.id(), handle.clone());
            handle
        };

        tracing::info!(
            run_id = %handle.id(),
            strategy_id,
            total = stocks.len(),
            workers = self.config.worker_count,
            "run started"
        );

        let driver = Driver {
            handle: handle.clone(),
            strategy,
            provider: Arc::clone(&self.provider),
            store: Arc::clone(&self.store),
            params: self.params.clone(),
            config: self.config.clone(),
        };
        tokio::spawn(driver.run(stocks));

        Ok(handle)
    }

    /// Handle for a live or finished run.
    pub async fn find(&self, run_id: RunId) -> Result<RunHandle, ScanError> {
        self.runs
            .lock()
            .await
            .get(&run_id)
            .cloned()
            .ok_or(ScanError::RunNotFound { run_id })
    }

    pub async fn status(&self, run_id: RunId) -> Result<ExecutionStatus, ScanError> {
        Ok(self.find(run_id).await?.status().await)
    }

    pub async fn cancel(&self, run_id: RunId) -> Result<(), ScanError> {
        let handle = self.find(run_id).await?;
        tracing::info!(run_id = %run_id, "cancellation requested");
        handle.cancel();
        Ok(())
    }

    pub async fn result(&self, run_id: RunId) -> Result<ExecutionResult, ScanError> {
        self.find(run_id).await?.result().await
    }
}

/// One evaluated stock, reported by a worker.
struct Outcome {
    code: String,
    evaluated: Result<Option<StockSignal>, ScanError>,
}

/// Per-run task that seeds the queue, spawns workers, folds their
/// outcomes into the shared state, and finalizes.
struct Driver {
    handle: RunHandle,
    strategy: Arc<dyn StrategyLogic>,
    provider: Arc<dyn MarketData>,
    store: Arc<dyn RecordStore>,
    params: IndicatorParams,
    config: EngineConfig,
}

impl Driver {
    async fn run(self, stocks: Vec<Stock>) {
        let total = stocks.len();
        if total == 0 {
            self.finalize().await;
            return;
        }

        let queue = Arc::new(Mutex::new(VecDeque::from(stocks)));
        let (tx, mut rx) = mpsc::unbounded_channel();
        for _ in 0..self.config.worker_count.clamp(1, total) {
            let worker = Worker {
                queue: Arc::clone(&queue),
                shared: Arc::clone(&self.handle.shared),
                provider: Arc::clone(&self.provider),
                strategy: Arc::clone(&self.strategy),
                params: self.params.clone(),
                lookback_days: self.config.lookback_days,
                fetch_timeout: self.config.fetch_timeout,
                tx: tx.clone(),
            };
            tokio::spawn(worker.run());
        }
        drop(tx);

        // The channel closes once every worker has exited.
        while let Some(outcome) = rx.recv().await {
            self.apply(outcome).await;
        }
        self.finalize().await;
    }

    async fn apply(&self, outcome: Outcome) {
        let completed_at = Instant::now();
        let mut inner = self.handle.shared.inner.write().await;
        inner.processed += 1;
        inner.speedometer.record(completed_at);
        inner.current_stock = Some(outcome.code.clone());
        match outcome.evaluated {
            Ok(Some(signal)) => {
                tracing::info!(code = %outcome.code, reason = %signal.reason, "signal");
                inner.signals.push(signal);
            }
            Ok(None) => {
                tracing::debug!(code = %outcome.code, "no signal");
            }
            Err(err) => {
                tracing::warn!(code = %outcome.code, error = %err, "stock evaluation failed");
                inner.error_count += 1;
                inner.last_error = Some(format!("{}: {err}", outcome.code));
            }
        }
    }

    async fn finalize(&self) {
        let result = {
            let mut inner = self.handle.shared.inner.write().await;
            let state = final_state(
                self.handle.is_cancelled(),
                inner.processed,
                inner.total,
                inner.error_count,
            );
            inner.state = state;
            inner.avg_speed = Some(inner.speedometer.overall_average(Instant::now()));
            let result = ExecutionResult {
                schema: RESULT_SCHEMA_VERSION,
                strategy_id: inner.strategy_id,
                strategy_name: self.strategy.descriptor().name.clone(),
                execution_time: inner.start_time,
                completion_time: Utc::now(),
                state,
                total_stocks: inner.total,
                processed_count: inner.processed,
                error_count: inner.error_count,
                signals: inner.signals.clone(),
            };
            inner.result = Some(result.clone());
            result
        };

        tracing::info!(
            run_id = %self.handle.id(),
            state = %result.state,
            processed = result.processed_count,
            errors = result.error_count,
            signals = result.signals.len(),
            "run finished"
        );

        self.persist(&result).await;
        self.handle.shared.state_tx.send_replace(result.state);
    }

    /// Every terminal run is persisted, cancelled ones included. A store
    /// failure is logged and surfaced via `last_error`; it does not change
    /// the run state.
    async fn persist(&self, result: &ExecutionResult) {
        let store = Arc::clone(&self.store);
        let document = result.clone();
        let appended = tokio::task::spawn_blocking(move || store.append(&document)).await;
        let failure = match appended {
            Ok(Ok(record)) => {
                tracing::info!(run_id = %self.handle.id(), file = %record.file_name, "execution record written");
                return;
            }
            Ok(Err(err)) => err.to_string(),
            Err(err) => err.to_string(),
        };
        tracing::error!(run_id = %self.handle.id(), error = %failure, "failed to persist execution record");
        let mut inner = self.handle.shared.inner.write().await;
        inner.last_error = Some(format!("record store: {failure}"));
    }
}

/// Pulls stocks off the shared queue until it drains or the run is
/// cancelled.
struct Worker {
    queue: Arc<Mutex<VecDeque<Stock>>>,
    shared: Arc<RunShared>,
    provider: Arc<dyn MarketData>,
    strategy: Arc<dyn StrategyLogic>,
    params: IndicatorParams,
    lookback_days: i64,
    fetch_timeout: Duration,
    tx: mpsc::UnboundedSender<Outcome>,
}

impl Worker {
    async fn run(self) {
        loop {
            if self.shared.cancelled.load(Ordering::SeqCst) {
                break;
            }
            let stock = self.queue.lock().await.pop_front();
            let Some(stock) = stock else { break };
            let evaluated = self.process(&stock).await;
            let outcome = Outcome {
                code: stock.code,
                evaluated,
            };
            // A closed channel means the driver is gone.
            if self.tx.send(outcome).is_err() {
                break;
            }
        }
    }

    async fn process(&self, stock: &Stock) -> Result<Option<StockSignal>, ScanError> {
        let end = Utc::now().date_naive();
        let start = end - chrono::Duration::days(self.lookback_days);
        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.provider.fetch_klines(&stock.code, start, end),
        )
        .await;
        let klines = match fetched {
            Ok(result) => result?,
            Err(_) => {
                return Err(ScanError::FetchTimeout {
                    code: stock.code.clone(),
                    timeout_secs: self.fetch_timeout.as_secs(),
                });
            }
        };
        let indicators = IndicatorSet::compute(&klines, &self.params)?;
        self.strategy.evaluate(stock, &klines, &indicators)
    }
}
