//! JSON file record store adapter.
//!
//! One pretty-printed document per run, named
//! `strategy_<id>_<YYYYMMDD_HHMMSS>.json` after the run's strategy and
//! start time. The directory is the whole store; listing is a scan.

use crate::domain::error::ScanError;
use crate::domain::execution::{ExecutionRecord, ExecutionResult};
use crate::ports::record_store::RecordStore;
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

pub struct JsonRecordStore {
    dir: PathBuf,
}

impl JsonRecordStore {
    /// Opens the store, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ScanError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn base_name(result: &ExecutionResult) -> String {
        format!(
            "strategy_{}_{}.json",
            result.strategy_id,
            result.execution_time.format("%Y%m%d_%H%M%S"),
        )
    }

    /// First free variant of the timestamped name; same-second collisions
    /// get `_2`, `_3`, ... before the extension.
    fn free_name(&self, base: &str) -> String {
        if !self.dir.join(base).exists() {
            return base.to_string();
        }
        let stem = base.trim_end_matches(".json");
        let mut attempt = 2u32;
        loop {
            let candidate = format!("{stem}_{attempt}.json");
            if !self.dir.join(&candidate).exists() {
                return candidate;
            }
            attempt += 1;
        }
    }
}

fn valid_record_name(file_name: &str) -> bool {
    file_name.starts_with("strategy_")
        && file_name.ends_with(".json")
        && !file_name.contains('/')
        && !file_name.contains('\\')
}

fn read_document(path: &Path) -> Result<ExecutionResult, ScanError> {
    let content = fs::read_to_string(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => ScanError::Record {
            reason: format!("no such record: {}", path.display()),
        },
        _ => ScanError::Io(err),
    })?;
    serde_json::from_str(&content).map_err(|err| ScanError::Record {
        reason: format!("malformed record {}: {err}", path.display()),
    })
}

impl RecordStore for JsonRecordStore {
    fn append(&self, result: &ExecutionResult) -> Result<ExecutionRecord, ScanError> {
        let file_name = self.free_name(&Self::base_name(result));
        let json = serde_json::to_string_pretty(result).map_err(|err| ScanError::Record {
            reason: format!("serialize {file_name}: {err}"),
        })?;
        fs::write(self.dir.join(&file_name), json)?;
        Ok(ExecutionRecord::from_result(file_name, result))
    }

    fn list(
        &self,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<ExecutionRecord>, ScanError> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !valid_record_name(&name) {
                continue;
            }
            let result = match read_document(&entry.path()) {
                Ok(result) => result,
                Err(err) => {
                    tracing::warn!(file = %name, error = %err, "skipping unreadable record");
                    continue;
                }
            };
            if let Some((from, to)) = range {
                let date = result.execution_time.date_naive();
                if date < from || date > to {
                    continue;
                }
            }
            records.push(ExecutionRecord::from_result(name.to_string(), &result));
        }
        records.sort_by(|a, b| b.execution_time.cmp(&a.execution_time));
        Ok(records)
    }

    fn load(&self, file_name: &str) -> Result<ExecutionResult, ScanError> {
        if !valid_record_name(file_name) {
            return Err(ScanError::Record {
                reason: format!("invalid record name: {file_name}"),
            });
        }
        read_document(&self.dir.join(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::execution::{RESULT_SCHEMA_VERSION, RunState};
    use crate::domain::stock::StockSignal;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn result_at(strategy_id: u32, y: i32, m: u32, d: u32) -> ExecutionResult {
        let start = Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap();
        ExecutionResult {
            schema: RESULT_SCHEMA_VERSION,
            strategy_id,
            strategy_name: format!("strategy {strategy_id}"),
            execution_time: start,
            completion_time: start + chrono::Duration::minutes(5),
            state: RunState::Completed,
            total_stocks: 10,
            processed_count: 10,
            error_count: 1,
            signals: vec![StockSignal {
                code: "600519".into(),
                name: "Kweichow Moutai".into(),
                price: 1700.0,
                change_pct: 1.2,
                turnover_pct: 0.4,
                reason: "golden cross at -0.35".into(),
            }],
        }
    }

    fn store() -> (TempDir, JsonRecordStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonRecordStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn append_names_by_strategy_and_start_time() {
        let (_dir, store) = store();
        let record = store.append(&result_at(2, 2024, 1, 15)).unwrap();

        assert_eq!(record.file_name, "strategy_2_20240115_093000.json");
        assert_eq!(record.strategy_id, 2);
        assert_eq!(record.signal_count, 1);
    }

    #[test]
    fn append_writes_pretty_json() {
        let (dir, store) = store();
        let record = store.append(&result_at(1, 2024, 1, 15)).unwrap();

        let content = fs::read_to_string(dir.path().join(&record.file_name)).unwrap();
        assert!(content.contains('\n'));
        assert!(content.contains("\"strategyId\": 1"));
        assert!(content.contains("\"state\": \"completed\""));
    }

    #[test]
    fn same_second_collision_gets_numeric_suffix() {
        let (_dir, store) = store();
        let result = result_at(1, 2024, 1, 15);

        let first = store.append(&result).unwrap();
        let second = store.append(&result).unwrap();
        let third = store.append(&result).unwrap();

        assert_eq!(first.file_name, "strategy_1_20240115_093000.json");
        assert_eq!(second.file_name, "strategy_1_20240115_093000_2.json");
        assert_eq!(third.file_name, "strategy_1_20240115_093000_3.json");
        assert_eq!(store.list(None).unwrap().len(), 3);
    }

    #[test]
    fn load_round_trips_the_document() {
        let (_dir, store) = store();
        let result = result_at(3, 2024, 2, 20);
        let record = store.append(&result).unwrap();

        let loaded = store.load(&record.file_name).unwrap();
        assert_eq!(loaded, result);
    }

    #[test]
    fn cancelled_state_survives_round_trip() {
        let (_dir, store) = store();
        let mut result = result_at(1, 2024, 2, 20);
        result.state = RunState::Cancelled;
        result.processed_count = 4;

        let record = store.append(&result).unwrap();
        let loaded = store.load(&record.file_name).unwrap();
        assert_eq!(loaded.state, RunState::Cancelled);
        assert_eq!(loaded.processed_count, 4);
    }

    #[test]
    fn list_sorts_newest_first_and_ignores_foreign_files() {
        let (dir, store) = store();
        store.append(&result_at(1, 2024, 1, 15)).unwrap();
        store.append(&result_at(2, 2024, 3, 10)).unwrap();
        store.append(&result_at(1, 2024, 2, 1)).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a record").unwrap();
        fs::write(dir.path().join("other.json"), "{}").unwrap();

        let records = store.list(None).unwrap();
        let dates: Vec<_> = records
            .iter()
            .map(|r| r.execution_time.date_naive())
            .collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
                NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            ]
        );
    }

    #[test]
    fn list_range_is_inclusive() {
        let (_dir, store) = store();
        store.append(&result_at(1, 2024, 1, 15)).unwrap();
        store.append(&result_at(1, 2024, 2, 1)).unwrap();
        store.append(&result_at(1, 2024, 3, 10)).unwrap();

        let from = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let to = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let records = store.list(Some((from, to))).unwrap();

        assert_eq!(records.len(), 2);
        assert!(
            records
                .iter()
                .all(|r| r.execution_time.date_naive() >= from)
        );
    }

    #[test]
    fn malformed_documents_are_skipped_in_listing() {
        let (dir, store) = store();
        store.append(&result_at(1, 2024, 1, 15)).unwrap();
        fs::write(
            dir.path().join("strategy_9_20240101_000000.json"),
            "{ not json",
        )
        .unwrap();

        let records = store.list(None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].strategy_id, 1);
    }

    #[test]
    fn load_rejects_traversal_and_foreign_names() {
        let (_dir, store) = store();

        for name in [
            "../strategy_1_20240115_093000.json",
            "sub/strategy_1_20240115_093000.json",
            "record.json",
            "strategy_1_20240115_093000.txt",
        ] {
            let err = store.load(name).unwrap_err();
            assert!(matches!(err, ScanError::Record { .. }), "{name}");
        }
    }

    #[test]
    fn load_missing_record_is_a_record_error() {
        let (_dir, store) = store();
        let err = store.load("strategy_1_20990101_000000.json").unwrap_err();
        match err {
            ScanError::Record { reason } => assert!(reason.contains("no such record")),
            other => panic!("expected Record error, got {other}"),
        }
    }
}
