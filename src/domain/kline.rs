//! Daily K-line bar and realtime quote representations.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One daily OHLCV bar. Percent fields are expressed in percent
/// (a 3% move is `3.0`), matching the classification thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KLine {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Turnover in currency units.
    pub amount: f64,
    /// (high - low) / previous close, in percent.
    pub amplitude_pct: f64,
    /// Close vs previous close, in percent.
    pub change_pct: f64,
    /// Close minus previous close.
    pub change_amount: f64,
    /// Volume / float shares, in percent.
    pub turnover_pct: f64,
}

/// Latest snapshot for one stock. `time` is UTC; market dates elsewhere
/// are timezone-free [`NaiveDate`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeQuote {
    pub code: String,
    pub name: String,
    pub price: f64,
    pub change_pct: f64,
    pub volume: f64,
    pub amount: f64,
    pub time: DateTime<Utc>,
}

impl RealtimeQuote {
    /// Derive a quote from the most recent daily bar, for providers that
    /// serve historical files rather than a live feed.
    pub fn from_latest_bar(code: &str, name: &str, bar: &KLine, time: DateTime<Utc>) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            price: bar.close,
            change_pct: bar.change_pct,
            volume: bar.volume,
            amount: bar.amount,
            time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bar() -> KLine {
        KLine {
            date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            open: 10.0,
            high: 10.8,
            low: 9.9,
            close: 10.5,
            volume: 1_200_000.0,
            amount: 12_600_000.0,
            amplitude_pct: 8.9,
            change_pct: 3.96,
            change_amount: 0.4,
            turnover_pct: 1.2,
        }
    }

    #[test]
    fn quote_from_latest_bar() {
        let bar = sample_bar();
        let time = Utc::now();
        let quote = RealtimeQuote::from_latest_bar("600519", "Kweichow Moutai", &bar, time);

        assert_eq!(quote.code, "600519");
        assert_eq!(quote.name, "Kweichow Moutai");
        assert!((quote.price - 10.5).abs() < f64::EPSILON);
        assert!((quote.change_pct - 3.96).abs() < f64::EPSILON);
        assert_eq!(quote.time, time);
    }

    #[test]
    fn kline_serializes_camel_case() {
        let json = serde_json::to_string(&sample_bar()).unwrap();
        assert!(json.contains("\"changePct\""));
        assert!(json.contains("\"turnoverPct\""));
        assert!(!json.contains("\"change_pct\""));
    }
}
