//! End-to-end pipeline tests over real adapters: CSV files on disk in,
//! JSON execution records out, with the retry decorator in the path the
//! way the CLI assembles it.

mod common;

use approx::assert_relative_eq;
use chrono::NaiveDate;
use common::*;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use stockscan::adapters::{CsvMarketData, JsonRecordStore, RetryingMarketData};
use stockscan::domain::backtest::BacktestParams;
use stockscan::domain::direction::Direction;
use stockscan::domain::error::ScanError;
use stockscan::domain::execution::RunState;
use stockscan::domain::indicator::IndicatorParams;
use stockscan::domain::kline::KLine;
use stockscan::domain::strategy::StrategyCatalog;
use stockscan::engine::EngineConfig;
use stockscan::service::ScanService;
use tempfile::TempDir;

const HEADER: &str =
    "date,open,high,low,close,volume,amount,amplitude_pct,change_pct,change_amount,turnover_pct\n";

fn csv_row(bar: &KLine) -> String {
    format!(
        "{},{},{},{},{},{},{},{},{},{},{}\n",
        bar.date.format("%Y-%m-%d"),
        bar.open,
        bar.high,
        bar.low,
        bar.close,
        bar.volume,
        bar.amount,
        bar.amplitude_pct,
        bar.change_pct,
        bar.change_amount,
        bar.turnover_pct,
    )
}

fn write_kline_csv(dir: &Path, code: &str, bars: &[KLine]) {
    let mut out = String::from(HEADER);
    for bar in bars {
        out.push_str(&csv_row(bar));
    }
    fs::write(dir.join(format!("{code}.csv")), out).unwrap();
}

fn write_listing(dir: &Path, entries: &[(&str, &str)]) {
    let mut out = String::from("code,name\n");
    for (code, name) in entries {
        out.push_str(&format!("{code},{name}\n"));
    }
    fs::write(dir.join("stocks.csv"), out).unwrap();
}

/// The provider stack the CLI builds: CSV files behind the retry decorator.
fn pipeline_service(data: &TempDir, records: &TempDir) -> ScanService {
    let provider =
        RetryingMarketData::with_policy(CsvMarketData::new(data.path()), 3, Duration::ZERO);
    ScanService::new(
        StrategyCatalog::builtin(),
        Arc::new(provider),
        Arc::new(JsonRecordStore::new(records.path()).unwrap()),
        IndicatorParams::default(),
        EngineConfig {
            worker_count: 2,
            ..EngineConfig::default()
        },
        BacktestParams::default(),
    )
}

#[tokio::test]
async fn a_full_scan_runs_from_csv_files_to_a_record() {
    let data = TempDir::new().unwrap();
    let records = TempDir::new().unwrap();
    write_kline_csv(data.path(), "600519", &breakout_series());
    write_listing(data.path(), &[("600519", "Kweichow Moutai")]);
    let service = pipeline_service(&data, &records);

    // No explicit codes: the universe comes from the listing file.
    let handle = service.run_strategy(3, None).await.unwrap();
    handle.wait().await;

    let result = service.result(handle.id()).await.unwrap();
    assert_eq!(result.state, RunState::Completed);
    assert_eq!(result.total_stocks, 1);
    assert_eq!(result.error_count, 0);
    assert_eq!(result.signals.len(), 1);
    assert_eq!(result.signals[0].code, "600519");
    assert_eq!(result.signals[0].name, "Kweichow Moutai");
    assert_relative_eq!(result.signals[0].price, 105.0);

    let listed = service.list_records(None).unwrap();
    assert_eq!(listed.len(), 1);
    let loaded = service.load_record(&listed[0].file_name).unwrap();
    assert_eq!(loaded, result);
}

#[tokio::test]
async fn a_backtest_scores_a_csv_series() {
    let data = TempDir::new().unwrap();
    let records = TempDir::new().unwrap();
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let bars: Vec<KLine> = (0..45)
        .map(|i| {
            let close = if i < 30 { 100.0 } else { 104.0 };
            make_bar(start + chrono::Duration::days(i), close, 1_000_000.0)
        })
        .collect();
    write_kline_csv(data.path(), "000001", &bars);
    let service = pipeline_service(&data, &records);

    let anchor = start + chrono::Duration::days(29);
    let outcome = service
        .run_backtest("000001", anchor, Direction::Up)
        .await
        .unwrap();

    assert!(outcome.correct);
    assert_eq!(outcome.actual_direction, Direction::Up);
    assert_relative_eq!(outcome.current_price, 100.0);
    assert_relative_eq!(outcome.next_price, 104.0);
    assert_relative_eq!(outcome.price_change_pct, 4.0);
    assert_eq!(outcome.historical.len(), 30);
    assert_eq!(outcome.future.len(), 15);
}

#[tokio::test]
async fn a_backtest_for_a_missing_file_is_unavailable() {
    let data = TempDir::new().unwrap();
    let records = TempDir::new().unwrap();
    let service = pipeline_service(&data, &records);

    let anchor = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
    let err = service
        .run_backtest("999999", anchor, Direction::Up)
        .await
        .unwrap_err();
    assert!(matches!(err, ScanError::DataUnavailable { code, .. } if code == "999999"));
}

#[tokio::test]
async fn a_quote_reads_the_latest_csv_bar() {
    let data = TempDir::new().unwrap();
    let records = TempDir::new().unwrap();
    write_kline_csv(data.path(), "600519", &breakout_series());
    write_listing(data.path(), &[("600519", "Kweichow Moutai")]);
    let service = pipeline_service(&data, &records);

    let quote = service.realtime("600519").await.unwrap();
    assert_eq!(quote.code, "600519");
    assert_eq!(quote.name, "Kweichow Moutai");
    assert_relative_eq!(quote.price, 105.0);
}
