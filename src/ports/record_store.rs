//! Execution record persistence port.

use crate::domain::error::ScanError;
use crate::domain::execution::{ExecutionRecord, ExecutionResult};
use chrono::NaiveDate;

/// Append-only storage for finished runs. There is no delete.
pub trait RecordStore: Send + Sync {
    /// Persists one result and returns its listing metadata, including
    /// the name it was stored under.
    fn append(&self, result: &ExecutionResult) -> Result<ExecutionRecord, ScanError>;

    /// Stored runs, newest first, optionally restricted to an inclusive
    /// execution-date range.
    fn list(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<ExecutionRecord>, ScanError>;

    /// Loads one stored document by the name `append` returned.
    fn load(&self, file_name: &str) -> Result<ExecutionResult, ScanError>;
}
