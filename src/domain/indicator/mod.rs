//! Technical indicator calculations.
//!
//! Each indicator is a pure function over a K-line series producing output
//! sequences aligned 1:1 with the input (same length, same index = same
//! date). Warm-up entries at the head of each sequence use the seed values
//! documented per indicator. Inputs shorter than an indicator's minimum
//! window fail with [`ScanError::InsufficientData`].

pub mod ema;
pub mod kdj;
pub mod macd;

pub use kdj::{KdjParams, KdjSeries, calculate_kdj};
pub use macd::{MacdParams, MacdSeries, calculate_macd};

use crate::domain::error::ScanError;
use crate::domain::kline::KLine;

/// Parameters for the bundled indicator set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorParams {
    pub kdj: KdjParams,
    pub macd: MacdParams,
}

/// One KDJ and one MACD evaluation over the same series, computed once per
/// stock and handed to strategies read-only.
#[derive(Debug, Clone)]
pub struct IndicatorSet {
    pub kdj: KdjSeries,
    pub macd: MacdSeries,
}

impl IndicatorSet {
    pub fn compute(klines: &[KLine], params: &IndicatorParams) -> Result<Self, ScanError> {
        Ok(Self {
            kdj: calculate_kdj(klines, &params.kdj)?,
            macd: calculate_macd(klines, &params.macd)?,
        })
    }

    /// Minimum series length both indicators can be computed from.
    pub fn min_bars(params: &IndicatorParams) -> usize {
        params
            .kdj
            .min_bars()
            .max(params.macd.min_bars())
    }
}
