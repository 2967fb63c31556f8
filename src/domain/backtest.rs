//! Direction backtest: replay a fixed window around an anchor date and
//! score a directional prediction against what the market did next.
//!
//! The evaluator is pure over a fetched K-line series; the service layer
//! owns the provider round-trip.

use crate::domain::direction::{Direction, classify};
use crate::domain::error::ScanError;
use crate::domain::kline::KLine;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Bars up to and including the anchor.
pub const HISTORICAL_WINDOW: usize = 30;
/// Bars after the anchor used to judge the outcome.
pub const FUTURE_WINDOW: usize = 15;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestParams {
    /// Neutral band ε for direction classification, in percent.
    pub neutral_band_pct: f64,
    /// Future bars defining the short-term trend (capped at the full
    /// future window).
    pub short_window: usize,
}

impl Default for BacktestParams {
    fn default() -> Self {
        Self {
            neutral_band_pct: 3.0,
            short_window: 5,
        }
    }
}

/// Outcome of one (stock, anchor date) backtest. Immutable once built;
/// `prices` is display-oriented (historical closes then future closes).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// The caller's prediction.
    pub direction: Direction,
    pub correct: bool,
    pub current_price: f64,
    pub next_price: f64,
    pub price_change_pct: f64,
    pub actual_direction: Direction,
    pub short_term_trend: Direction,
    pub short_term_change_pct: f64,
    pub long_term_trend: Direction,
    pub long_term_change_pct: f64,
    pub max_price: f64,
    pub min_price: f64,
    pub days_count: usize,
    pub historical: Vec<KLine>,
    pub future: Vec<KLine>,
    pub prices: Vec<f64>,
}

/// Evaluate a directional prediction for `code` anchored at `anchor`.
///
/// `klines` is the full available series, ascending by date. The anchor
/// must be present; the 30 bars ending at it and the 15 after it must both
/// be complete, otherwise the evaluation fails fast with
/// [`ScanError::InsufficientHistory`] rather than truncating a window.
pub fn evaluate(
    code: &str,
    klines: &[KLine],
    anchor: NaiveDate,
    predicted: Direction,
    params: &BacktestParams,
) -> Result<TestResult, ScanError> {
    let anchor_idx = klines
        .iter()
        .position(|bar| bar.date == anchor)
        .ok_or_else(|| insufficient(code, klines, anchor))?;

    let have_before = anchor_idx + 1;
    let have_after = klines.len() - anchor_idx - 1;
    if have_before < HISTORICAL_WINDOW || have_after < FUTURE_WINDOW {
        return Err(ScanError::InsufficientHistory {
            code: code.to_string(),
            anchor,
            have_before,
            have_after,
        });
    }

    let historical = klines[anchor_idx + 1 - HISTORICAL_WINDOW..=anchor_idx].to_vec();
    let future = klines[anchor_idx + 1..anchor_idx + 1 + FUTURE_WINDOW].to_vec();

    let current_price = historical[HISTORICAL_WINDOW - 1].close;
    let next_price = future[0].close;
    let price_change_pct = change_pct(current_price, next_price);
    let actual_direction = classify(price_change_pct, params.neutral_band_pct);

    let short_window = params.short_window.clamp(1, FUTURE_WINDOW);
    let short_term_change_pct = change_pct(current_price, future[short_window - 1].close);
    let long_term_change_pct = change_pct(current_price, future[FUTURE_WINDOW - 1].close);

    let max_price = future.iter().map(|bar| bar.high).fold(f64::MIN, f64::max);
    let min_price = future.iter().map(|bar| bar.low).fold(f64::MAX, f64::min);

    let prices = historical
        .iter()
        .chain(future.iter())
        .map(|bar| bar.close)
        .collect();

    Ok(TestResult {
        direction: predicted,
        correct: predicted == actual_direction,
        current_price,
        next_price,
        price_change_pct,
        actual_direction,
        short_term_trend: classify(short_term_change_pct, params.neutral_band_pct),
        short_term_change_pct,
        long_term_trend: classify(long_term_change_pct, params.neutral_band_pct),
        long_term_change_pct,
        max_price,
        min_price,
        days_count: FUTURE_WINDOW,
        historical,
        future,
        prices,
    })
}

fn change_pct(from: f64, to: f64) -> f64 {
    (to - from) / from * 100.0
}

fn insufficient(code: &str, klines: &[KLine], anchor: NaiveDate) -> ScanError {
    let have_before = klines.iter().filter(|bar| bar.date <= anchor).count();
    ScanError::InsufficientHistory {
        code: code.to_string(),
        anchor,
        have_before,
        have_after: klines.len() - have_before,
    }
}
