//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::{CsvMarketData, IniConfig, JsonRecordStore, RetryingMarketData};
use crate::config::{ProviderKind, ScanConfig};
use crate::domain::backtest::TestResult;
use crate::domain::direction::Direction;
use crate::domain::error::ScanError;
use crate::domain::stock::StockSignal;
use crate::domain::strategy::StrategyCatalog;
use crate::domain::universe::parse_codes;
use crate::ports::MarketData;
use crate::service::ScanService;

#[derive(Parser, Debug)]
#[command(
    name = "stockscan",
    about = "Strategy scanner and direction backtester for daily K-line data"
)]
pub struct Cli {
    /// INI configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit data output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a strategy over the stock universe
    Scan {
        /// Strategy id (see `strategies`)
        #[arg(short, long)]
        strategy: u32,
        /// Comma-separated stock codes; defaults to the full listing
        #[arg(long)]
        codes: Option<String>,
    },
    /// Score a directional prediction against what the market did
    Backtest {
        #[arg(long)]
        code: String,
        /// Anchor date, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        /// Predicted direction: up, down, or shock
        #[arg(long)]
        direction: Direction,
    },
    /// List the bundled strategies
    Strategies,
    /// List stored execution records
    Records {
        /// Only records on or after this date
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Only records on or before this date
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Print one stored execution record
    Record {
        /// Record file name as listed by `records`
        file: String,
    },
    /// Latest quote for one stock
    Quote { code: String },
}

/// Seconds between progress lines while a scan runs.
const PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

pub async fn run(cli: Cli) -> ExitCode {
    init_tracing();

    let service = match build_service(cli.config.as_deref()) {
        Ok(service) => service,
        Err(code) => return code,
    };

    match cli.command {
        Command::Scan { strategy, codes } => {
            run_scan(&service, strategy, codes.as_deref(), cli.json).await
        }
        Command::Backtest {
            code,
            date,
            direction,
        } => run_backtest(&service, &code, date, direction, cli.json).await,
        Command::Strategies => run_strategies(&service, cli.json),
        Command::Records { from, to } => run_records(&service, from, to, cli.json),
        Command::Record { file } => run_record(&service, &file, cli.json),
        Command::Quote { code } => run_quote(&service, &code, cli.json).await,
    }
}

fn init_tracing() {
    // try_init so tests and embedders with their own subscriber win.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn fail(err: &ScanError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

fn build_service(config_path: Option<&std::path::Path>) -> Result<ScanService, ExitCode> {
    let port = match config_path {
        Some(path) => IniConfig::from_file(path).map_err(|e| fail(&e))?,
        None => IniConfig::empty(),
    };
    let config = ScanConfig::from_port(&port).map_err(|e| fail(&e))?;

    let provider = build_provider(&config).map_err(|e| fail(&e))?;
    let store = JsonRecordStore::new(&config.records_dir).map_err(|e| fail(&e))?;

    Ok(ScanService::new(
        StrategyCatalog::builtin(),
        provider,
        Arc::new(store),
        Default::default(),
        config.engine.clone(),
        config.backtest.clone(),
    ))
}

fn build_provider(config: &ScanConfig) -> Result<Arc<dyn MarketData>, ScanError> {
    match config.data.provider {
        ProviderKind::Csv => Ok(Arc::new(RetryingMarketData::with_policy(
            CsvMarketData::new(&config.data.csv_dir),
            config.retry.attempts,
            config.retry.backoff,
        ))),
        ProviderKind::Sqlite => {
            #[cfg(feature = "sqlite")]
            {
                use crate::adapters::SqliteMarketData;
                let path = config.data.sqlite_path.as_ref().ok_or_else(|| {
                    ScanError::ConfigMissing {
                        section: "data".into(),
                        key: "sqlite_path".into(),
                    }
                })?;
                Ok(Arc::new(RetryingMarketData::with_policy(
                    SqliteMarketData::open(path, config.data.sqlite_pool_size)?,
                    config.retry.attempts,
                    config.retry.backoff,
                )))
            }
            #[cfg(not(feature = "sqlite"))]
            {
                Err(ScanError::ConfigInvalid {
                    section: "data".into(),
                    key: "provider".into(),
                    reason: "this build has no sqlite support".into(),
                })
            }
        }
    }
}

async fn run_scan(
    service: &ScanService,
    strategy_id: u32,
    codes: Option<&str>,
    json: bool,
) -> ExitCode {
    let codes = match codes {
        Some(input) => match parse_codes(input) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                eprintln!("error: invalid code list: {e}");
                return ExitCode::from(2);
            }
        },
        None => None,
    };

    let handle = match service.run_strategy(strategy_id, codes).await {
        Ok(handle) => handle,
        Err(e) => return fail(&e),
    };

    let started = handle.status().await;
    eprintln!(
        "Scanning {} stocks with strategy {} (run {})",
        started.total_stocks,
        strategy_id,
        handle.id()
    );

    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = handle.wait() => break,
            _ = ticker.tick() => {
                let status = handle.status().await;
                if status.state.is_terminal() {
                    break;
                }
                let eta = match status.eta_seconds {
                    Some(eta) => format!(", ETA {eta}s"),
                    None => String::new(),
                };
                eprintln!(
                    "  {:>5.1}%  {}/{} processed, {} errors, {:.1}/s{}",
                    status.progress_pct,
                    status.processed_count,
                    status.total_stocks,
                    status.error_count,
                    status.speed,
                    eta
                );
            }
        }
    }

    let result = match handle.result().await {
        Ok(result) => result,
        Err(e) => return fail(&e),
    };

    if json {
        return print_json(&result);
    }

    eprintln!(
        "Run {}: {} of {} processed, {} errors, {} signals",
        result.state,
        result.processed_count,
        result.total_stocks,
        result.error_count,
        result.signals.len()
    );
    print_signal_table(&result.signals);

    if let Ok(records) = service.list_records(None) {
        if let Some(record) = records
            .iter()
            .find(|r| r.execution_time == result.execution_time && r.strategy_id == strategy_id)
        {
            eprintln!("Record written: {}", record.file_name);
        }
    }

    ExitCode::SUCCESS
}

async fn run_backtest(
    service: &ScanService,
    code: &str,
    date: NaiveDate,
    direction: Direction,
    json: bool,
) -> ExitCode {
    let result = match service.run_backtest(code, date, direction).await {
        Ok(result) => result,
        Err(e) => return fail(&e),
    };

    if json {
        return print_json(&result);
    }
    print_test_result(code, date, &result);
    ExitCode::SUCCESS
}

fn print_test_result(code: &str, date: NaiveDate, result: &TestResult) {
    println!("Backtest {code} @ {date}");
    println!("  Prediction:  {}", result.direction);
    println!(
        "  Actual:      {} ({:+.2}% next close, {:.2} -> {:.2})",
        result.actual_direction, result.price_change_pct, result.current_price, result.next_price
    );
    println!(
        "  Correct:     {}",
        if result.correct { "yes" } else { "no" }
    );
    println!(
        "  Short term:  {} ({:+.2}%)",
        result.short_term_trend, result.short_term_change_pct
    );
    println!(
        "  Long term:   {} ({:+.2}%)",
        result.long_term_trend, result.long_term_change_pct
    );
    println!(
        "  Range:       {:.2} .. {:.2} over {} bars",
        result.min_price, result.max_price, result.days_count
    );
}

fn run_strategies(service: &ScanService, json: bool) -> ExitCode {
    let strategies = service.strategies();
    if json {
        return print_json(&strategies);
    }
    println!("{:<4} {:<26} DESCRIPTION", "ID", "NAME");
    for strategy in &strategies {
        println!(
            "{:<4} {:<26} {}",
            strategy.id, strategy.name, strategy.description
        );
    }
    ExitCode::SUCCESS
}

fn run_records(
    service: &ScanService,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    json: bool,
) -> ExitCode {
    let range = match (from, to) {
        (None, None) => None,
        (from, to) => Some((
            from.unwrap_or(NaiveDate::MIN),
            to.unwrap_or(NaiveDate::MAX),
        )),
    };

    let records = match service.list_records(range) {
        Ok(records) => records,
        Err(e) => return fail(&e),
    };

    if json {
        return print_json(&records);
    }

    if records.is_empty() {
        eprintln!("No records found");
        return ExitCode::SUCCESS;
    }
    println!(
        "{:<42} {:<20} {:<10} {:>8} {:>11}",
        "FILE", "EXECUTED", "STATE", "SIGNALS", "PROCESSED"
    );
    for record in &records {
        println!(
            "{:<42} {:<20} {:<10} {:>8} {:>6}/{}",
            record.file_name,
            record.execution_time.format("%Y-%m-%d %H:%M:%S"),
            record.state.to_string(),
            record.signal_count,
            record.processed_count,
            record.total_stocks
        );
    }
    ExitCode::SUCCESS
}

fn run_record(service: &ScanService, file: &str, json: bool) -> ExitCode {
    let result = match service.load_record(file) {
        Ok(result) => result,
        Err(e) => return fail(&e),
    };

    if json {
        return print_json(&result);
    }

    println!(
        "{} (strategy {} \"{}\"), executed {}",
        file,
        result.strategy_id,
        result.strategy_name,
        result.execution_time.format("%Y-%m-%d %H:%M:%S")
    );
    println!(
        "  {}: {} of {} processed, {} errors",
        result.state, result.processed_count, result.total_stocks, result.error_count
    );
    print_signal_table(&result.signals);
    ExitCode::SUCCESS
}

async fn run_quote(service: &ScanService, code: &str, json: bool) -> ExitCode {
    let quote = match service.realtime(code).await {
        Ok(quote) => quote,
        Err(e) => return fail(&e),
    };

    if json {
        return print_json(&quote);
    }
    println!(
        "{} {} {:.2} ({:+.2}%) as of {}",
        quote.code,
        quote.name,
        quote.price,
        quote.change_pct,
        quote.time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    ExitCode::SUCCESS
}

fn print_signal_table(signals: &[StockSignal]) {
    if signals.is_empty() {
        println!("No signals");
        return;
    }
    println!(
        "{:<10} {:<18} {:>10} {:>8} {:>8}  REASON",
        "CODE", "NAME", "PRICE", "CHG%", "TURN%"
    );
    for signal in signals {
        println!(
            "{:<10} {:<18} {:>10.2} {:>8.2} {:>8.2}  {}",
            signal.code,
            signal.name,
            signal.price,
            signal.change_pct,
            signal.turnover_pct,
            signal.reason
        );
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => {
            println!("{rendered}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}
