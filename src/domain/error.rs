//! Domain error types.

use uuid::Uuid;

/// Top-level error type for stockscan.
///
/// Per-stock failures inside an engine run are carried as values of this
/// type too; the engine counts them instead of propagating them.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("insufficient data: have {have} bars, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error(
        "insufficient history for {code} at {anchor}: {have_before} bars up to anchor, {have_after} after"
    )]
    InsufficientHistory {
        code: String,
        anchor: chrono::NaiveDate,
        have_before: usize,
        have_after: usize,
    },

    #[error("data unavailable for {code}: {reason}")]
    DataUnavailable { code: String, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("fetch timed out for {code} after {timeout_secs}s")]
    FetchTimeout { code: String, timeout_secs: u64 },

    #[error("strategy {strategy_id} already has a run in progress")]
    ConcurrentRun { strategy_id: u32 },

    #[error("no strategy with id {strategy_id}")]
    StrategyNotFound { strategy_id: u32 },

    #[error("no run with id {run_id}")]
    RunNotFound { run_id: Uuid },

    #[error("run {run_id} has not finished")]
    NotReady { run_id: Uuid },

    #[error("strategy {id} failed on {code}: {reason}")]
    Strategy {
        id: u32,
        code: String,
        reason: String,
    },

    #[error("record store error: {reason}")]
    Record { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&ScanError> for std::process::ExitCode {
    fn from(err: &ScanError) -> Self {
        let code: u8 = match err {
            ScanError::Io(_) => 1,
            ScanError::ConfigParse { .. }
            | ScanError::ConfigMissing { .. }
            | ScanError::ConfigInvalid { .. } => 2,
            ScanError::DataUnavailable { .. }
            | ScanError::Database { .. }
            | ScanError::FetchTimeout { .. }
            | ScanError::InsufficientData { .. }
            | ScanError::InsufficientHistory { .. } => 3,
            ScanError::StrategyNotFound { .. } | ScanError::Strategy { .. } => 4,
            ScanError::ConcurrentRun { .. }
            | ScanError::RunNotFound { .. }
            | ScanError::NotReady { .. } => 5,
            ScanError::Record { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
