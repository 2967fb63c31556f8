//! Exponential moving average over a raw value sequence.
//!
//! k = 2/(n+1), seed with the first SMA, then EMA[i] = v[i]*k + EMA[i-1]*(1-k).
//! Warm-up: the first (n-1) outputs are 0.0.

/// EMA aligned 1:1 with `values`. Returns all zeros when the input is
/// shorter than `period`; callers enforce their own minimum lengths.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = seed;

    let k = 2.0 / (period as f64 + 1.0);
    let mut current = seed;
    for i in period..values.len() {
        current = values[i] * k + current * (1.0 - k);
        out[i] = current;
    }

    out
}

/// EMA of the live tail of a sequence whose first `offset` entries are
/// warm-up zeros. Output stays zero through `offset + period - 2`; used to
/// chain a signal EMA onto a line that itself has a warm-up region.
pub fn ema_from(values: &[f64], offset: usize, period: usize) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];
    if period == 0 || offset >= values.len() {
        return out;
    }

    let live = &values[offset..];
    let tail = ema(live, period);
    out[offset..].copy_from_slice(&tail);
    out
}
