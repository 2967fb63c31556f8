//! Typed runtime configuration assembled from a [`ConfigPort`].
//!
//! Every key has a default, so an absent file yields a fully working
//! setup reading CSV data from `./data` and writing records to
//! `./records`. Out-of-range values fail loading rather than being
//! silently clamped.

use crate::domain::backtest::BacktestParams;
use crate::domain::error::ScanError;
use crate::engine::EngineConfig;
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Csv,
    Sqlite,
}

/// Data-source selection and locations, `[data]` section.
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub provider: ProviderKind,
    pub csv_dir: PathBuf,
    /// Required when `provider = sqlite`.
    pub sqlite_path: Option<PathBuf>,
    pub sqlite_pool_size: u32,
}

/// Provider retry policy, `[engine]` section.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub attempts: u32,
    pub backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub data: DataConfig,
    pub engine: EngineConfig,
    pub retry: RetryConfig,
    pub backtest: BacktestParams,
    pub records_dir: PathBuf,
}

fn at_least_one(port: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Result<i64, ScanError> {
    let value = port.get_int(section, key, default);
    if value < 1 {
        return Err(ScanError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: format!("must be at least 1, got {value}"),
        });
    }
    Ok(value)
}

impl ScanConfig {
    pub fn from_port(port: &dyn ConfigPort) -> Result<Self, ScanError> {
        let provider = match port
            .get_string("data", "provider")
            .unwrap_or_else(|| "csv".into())
            .to_lowercase()
            .as_str()
        {
            "csv" => ProviderKind::Csv,
            "sqlite" => ProviderKind::Sqlite,
            other => {
                return Err(ScanError::ConfigInvalid {
                    section: "data".into(),
                    key: "provider".into(),
                    reason: format!("expected csv or sqlite, got {other}"),
                });
            }
        };

        let sqlite_path = port.get_string("data", "sqlite_path").map(PathBuf::from);
        if provider == ProviderKind::Sqlite && sqlite_path.is_none() {
            return Err(ScanError::ConfigMissing {
                section: "data".into(),
                key: "sqlite_path".into(),
            });
        }

        let data = DataConfig {
            provider,
            csv_dir: port
                .get_string("data", "csv_dir")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data")),
            sqlite_path,
            sqlite_pool_size: at_least_one(port, "data", "pool_size", 4)? as u32,
        };

        let engine = EngineConfig {
            worker_count: at_least_one(port, "engine", "worker_count", 16)? as usize,
            fetch_timeout: Duration::from_secs(
                at_least_one(port, "engine", "fetch_timeout_secs", 30)? as u64,
            ),
            speed_window: EngineConfig::default().speed_window,
            lookback_days: at_least_one(port, "engine", "lookback_days", 365)?,
        };

        let retry = RetryConfig {
            attempts: at_least_one(port, "engine", "retry_attempts", 3)? as u32,
            backoff: {
                let ms = port.get_int("engine", "retry_backoff_ms", 500);
                if ms < 0 {
                    return Err(ScanError::ConfigInvalid {
                        section: "engine".into(),
                        key: "retry_backoff_ms".into(),
                        reason: format!("must not be negative, got {ms}"),
                    });
                }
                Duration::from_millis(ms as u64)
            },
        };

        let neutral_band_pct = port.get_double("backtest", "neutral_band_pct", 3.0);
        if neutral_band_pct <= 0.0 {
            return Err(ScanError::ConfigInvalid {
                section: "backtest".into(),
                key: "neutral_band_pct".into(),
                reason: format!("must be positive, got {neutral_band_pct}"),
            });
        }
        let backtest = BacktestParams {
            neutral_band_pct,
            short_window: at_least_one(port, "backtest", "short_window", 5)? as usize,
        };

        Ok(ScanConfig {
            data,
            engine,
            retry,
            backtest,
            records_dir: port
                .get_string("records", "dir")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("records")),
        })
    }
}
