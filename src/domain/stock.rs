//! Stock identity and strategy signal types.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A universe member: exchange-style numeric code plus display name.
/// `last_tested` is the most recent backtest anchor the provider has on
/// file for this stock, when it tracks one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stock {
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tested: Option<NaiveDate>,
}

impl Stock {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            last_tested: None,
        }
    }

    /// Universe entry for a code the provider does not list; the code
    /// doubles as the display name.
    pub fn unnamed(code: impl Into<String>) -> Self {
        let code = code.into();
        Self {
            name: code.clone(),
            code,
            last_tested: None,
        }
    }
}

/// A stock a strategy selected, with the closing context the strategy saw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSignal {
    pub code: String,
    pub name: String,
    /// Close of the most recent bar at evaluation time.
    pub price: f64,
    pub change_pct: f64,
    pub turnover_pct: f64,
    /// Human-readable explanation produced by the strategy.
    pub reason: String,
}
