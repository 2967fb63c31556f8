//! MACD convergence/divergence triplet.
//!
//! DIF = EMA(close, fast) - EMA(close, slow), zero until the slow EMA is
//! live. DEA = EMA of the live DIF region over the signal period. The
//! histogram MACD = (DIF - DEA) * 2, zero until the signal EMA is seeded.

use crate::domain::error::ScanError;
use crate::domain::indicator::ema::{ema, ema_from};
use crate::domain::kline::KLine;

/// `fast_period` must be smaller than `slow_period`; the config layer
/// rejects anything else.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

impl MacdParams {
    /// First index with a live histogram is `slow + signal - 2`, so one
    /// more bar than that is required.
    pub fn min_bars(&self) -> usize {
        self.slow_period + self.signal_period - 1
    }
}

/// DIF/DEA/MACD sequences aligned 1:1 with the input series.
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    pub dif: Vec<f64>,
    pub dea: Vec<f64>,
    pub macd: Vec<f64>,
}

impl MacdSeries {
    pub fn len(&self) -> usize {
        self.dif.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dif.is_empty()
    }
}

/// Compute the MACD triplet over a K-line series. Fails with
/// [`ScanError::InsufficientData`] when the series cannot produce a single
/// live histogram value.
pub fn calculate_macd(klines: &[KLine], params: &MacdParams) -> Result<MacdSeries, ScanError> {
    let fast = params.fast_period.max(1);
    let slow = params.slow_period.max(1);
    let signal = params.signal_period.max(1);

    let need = slow + signal - 1;
    if klines.len() < need {
        return Err(ScanError::InsufficientData {
            have: klines.len(),
            need,
        });
    }

    let closes: Vec<f64> = klines.iter().map(|bar| bar.close).collect();
    let fast_ema = ema(&closes, fast);
    let slow_ema = ema(&closes, slow);

    let mut dif = vec![0.0; closes.len()];
    for i in (slow - 1)..closes.len() {
        dif[i] = fast_ema[i] - slow_ema[i];
    }

    let dea = ema_from(&dif, slow - 1, signal);

    // The histogram only becomes meaningful once the signal EMA is seeded;
    // force the warm-up region to zero like the DIF/DEA heads.
    let mut macd = vec![0.0; closes.len()];
    for i in (slow + signal - 2)..closes.len() {
        macd[i] = (dif[i] - dea[i]) * 2.0;
    }

    Ok(MacdSeries { dif, dea, macd })
}
