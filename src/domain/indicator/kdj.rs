//! KDJ stochastic oscillator.
//!
//! RSV[i] = (close[i] - low_n) / (high_n - low_n) * 100 over the trailing
//! `rsv_period` window of bar highs/lows, then smoothed:
//! K[i] = ((m1-1)*K[i-1] + RSV[i]) / m1, D[i] = ((m2-1)*D[i-1] + K[i]) / m2,
//! J[i] = 3*K[i] - 2*D[i]. Warm-up RSV is the neutral 50, the series is
//! seeded K[0] = D[0] = J[0] = 50, and every output is clamped to [0, 100].

use crate::domain::error::ScanError;
use crate::domain::kline::KLine;

#[derive(Debug, Clone, PartialEq)]
pub struct KdjParams {
    pub rsv_period: usize,
    pub k_smoothing: usize,
    pub d_smoothing: usize,
}

impl Default for KdjParams {
    fn default() -> Self {
        Self {
            rsv_period: 9,
            k_smoothing: 3,
            d_smoothing: 3,
        }
    }
}

impl KdjParams {
    pub fn min_bars(&self) -> usize {
        self.rsv_period
    }
}

/// K/D/J sequences aligned 1:1 with the input series.
#[derive(Debug, Clone, PartialEq)]
pub struct KdjSeries {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
    pub j: Vec<f64>,
}

impl KdjSeries {
    pub fn len(&self) -> usize {
        self.k.len()
    }

    pub fn is_empty(&self) -> bool {
        self.k.is_empty()
    }
}

/// Compute KDJ over a K-line series. Fails with
/// [`ScanError::InsufficientData`] when the series is shorter than the RSV
/// window.
pub fn calculate_kdj(klines: &[KLine], params: &KdjParams) -> Result<KdjSeries, ScanError> {
    // Degenerate parameters fall back to the smallest meaningful window.
    let n = params.rsv_period.max(1);
    let m1 = params.k_smoothing.max(1) as f64;
    let m2 = params.d_smoothing.max(1) as f64;

    if klines.len() < n {
        return Err(ScanError::InsufficientData {
            have: klines.len(),
            need: n,
        });
    }

    let mut rsv = vec![50.0; klines.len()];
    for i in (n - 1)..klines.len() {
        let window = &klines[i + 1 - n..=i];
        let high_n = window.iter().map(|bar| bar.high).fold(f64::MIN, f64::max);
        let low_n = window.iter().map(|bar| bar.low).fold(f64::MAX, f64::min);

        if high_n > low_n {
            rsv[i] = (klines[i].close - low_n) / (high_n - low_n) * 100.0;
        }
    }

    let mut k = vec![50.0; klines.len()];
    let mut d = vec![50.0; klines.len()];
    let mut j = vec![50.0; klines.len()];

    for i in 1..klines.len() {
        k[i] = ((m1 - 1.0) * k[i - 1] + rsv[i]) / m1;
        d[i] = ((m2 - 1.0) * d[i - 1] + k[i]) / m2;
        j[i] = 3.0 * k[i] - 2.0 * d[i];

        k[i] = k[i].clamp(0.0, 100.0);
        d[i] = d[i].clamp(0.0, 100.0);
        j[i] = j[i].clamp(0.0, 100.0);
    }

    Ok(KdjSeries { k, d, j })
}
