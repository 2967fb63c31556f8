//! Run lifecycle states and the execution result/record value types.
//!
//! These are the shapes the engine reports and the record store persists;
//! the machinery that produces them lives in [`crate::engine`].

use crate::domain::stock::StockSignal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Version tag written into every persisted execution document.
pub const RESULT_SCHEMA_VERSION: u32 = 1;

/// Lifecycle of one run: `idle → running → {completed | failed |
/// cancelled}`. No transition leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::Failed | RunState::Cancelled
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        };
        write!(f, "{text}")
    }
}

/// Point-in-time snapshot of a run. Written only by the engine driver,
/// read by anyone; counters are monotonic and freeze at terminal states.
/// All engine timestamps are UTC.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStatus {
    pub state: RunState,
    pub strategy_id: u32,
    pub start_time: DateTime<Utc>,
    pub total_stocks: usize,
    pub processed_count: usize,
    pub error_count: usize,
    /// Most recently completed stock code; parallel workers make "the one
    /// in flight" non-singular.
    pub current_stock: Option<String>,
    pub progress_pct: f64,
    /// Stocks per second; overall run average once terminal.
    pub speed: f64,
    pub eta_seconds: Option<u64>,
    pub last_error: Option<String>,
}

/// Processed share in percent; an empty universe is complete by definition.
pub fn progress_pct(processed: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        processed as f64 / total as f64 * 100.0
    }
}

/// Terminal state for a finished driver loop.
pub fn final_state(cancelled: bool, processed: usize, total: usize, errors: usize) -> RunState {
    if cancelled && processed < total {
        RunState::Cancelled
    } else if total > 0 && errors == total {
        RunState::Failed
    } else {
        RunState::Completed
    }
}

/// Immutable payload of a finished run; this is what the record store
/// persists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub schema: u32,
    pub strategy_id: u32,
    pub strategy_name: String,
    /// Run start, UTC.
    pub execution_time: DateTime<Utc>,
    pub completion_time: DateTime<Utc>,
    pub state: RunState,
    pub total_stocks: usize,
    pub processed_count: usize,
    pub error_count: usize,
    pub signals: Vec<StockSignal>,
}

/// Listing metadata for one stored run, derived from the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub file_name: String,
    pub strategy_id: u32,
    pub strategy_name: String,
    pub execution_time: DateTime<Utc>,
    pub state: RunState,
    pub signal_count: usize,
    pub processed_count: usize,
    pub total_stocks: usize,
}

impl ExecutionRecord {
    pub fn from_result(file_name: impl Into<String>, result: &ExecutionResult) -> Self {
        Self {
            file_name: file_name.into(),
            strategy_id: result.strategy_id,
            strategy_name: result.strategy_name.clone(),
            execution_time: result.execution_time,
            state: result.state,
            signal_count: result.signals.len(),
            processed_count: result.processed_count,
            total_stocks: result.total_stocks,
        }
    }
}
