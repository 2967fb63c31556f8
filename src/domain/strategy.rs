//! Strategy descriptors, the evaluation trait, and the bundled strategies.
//!
//! A strategy is a pure predicate over one stock's K-line series and its
//! precomputed indicators. Implementations must be deterministic, must not
//! perform I/O, and may be called from multiple worker tasks at once.

use crate::domain::error::ScanError;
use crate::domain::indicator::IndicatorSet;
use crate::domain::kline::KLine;
use crate::domain::stock::{Stock, StockSignal};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Catalog metadata for one strategy. `source` locates the implementation
/// (module path for the bundled ones).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
    pub id: u32,
    pub name: String,
    pub description: String,
    pub source: String,
}

/// The strategy extension point. Returning `Ok(None)` means "no signal";
/// an `Err` is recorded as a per-stock failure by the engine and never
/// aborts a run.
pub trait StrategyLogic: Send + Sync {
    fn descriptor(&self) -> &Strategy;

    fn evaluate(
        &self,
        stock: &Stock,
        klines: &[KLine],
        indicators: &IndicatorSet,
    ) -> Result<Option<StockSignal>, ScanError>;
}

impl fmt::Debug for dyn StrategyLogic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StrategyLogic").field(self.descriptor()).finish()
    }
}

/// Signal carrying the closing context of the latest bar.
fn signal_from_latest(stock: &Stock, last: &KLine, reason: String) -> StockSignal {
    StockSignal {
        code: stock.code.clone(),
        name: stock.name.clone(),
        price: last.close,
        change_pct: last.change_pct,
        turnover_pct: last.turnover_pct,
        reason,
    }
}

/// J level at or under which the market counts as oversold.
const OVERSOLD_J: f64 = 20.0;

/// KDJ oversold reversal: the previous bar was deeply oversold (J at or
/// below the floor) and K crossed above D on the latest bar.
pub struct KdjOversoldReversal {
    descriptor: Strategy,
}

impl KdjOversoldReversal {
    pub fn new() -> Self {
        Self {
            descriptor: Strategy {
                id: 1,
                name: "KDJ oversold reversal".to_string(),
                description: "K crosses above D right after J was at or below 20".to_string(),
                source: "builtin::kdj_oversold_reversal".to_string(),
            },
        }
    }
}

impl Default for KdjOversoldReversal {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyLogic for KdjOversoldReversal {
    fn descriptor(&self) -> &Strategy {
        &self.descriptor
    }

    fn evaluate(
        &self,
        stock: &Stock,
        klines: &[KLine],
        indicators: &IndicatorSet,
    ) -> Result<Option<StockSignal>, ScanError> {
        let kdj = &indicators.kdj;
        let Some(last) = klines.last() else {
            return Ok(None);
        };
        if kdj.len() < 2 {
            return Ok(None);
        }

        let i = kdj.len() - 1;
        let oversold = kdj.j[i - 1] <= OVERSOLD_J;
        let crossed = kdj.k[i] > kdj.d[i] && kdj.k[i - 1] <= kdj.d[i - 1];

        if oversold && crossed {
            let reason = format!(
                "KDJ oversold reversal: J was {:.1}, K {:.1} crossed above D {:.1}",
                kdj.j[i - 1],
                kdj.k[i],
                kdj.d[i]
            );
            return Ok(Some(signal_from_latest(stock, last, reason)));
        }
        Ok(None)
    }
}

/// MACD golden cross: DIF crossed above DEA on the latest bar while both
/// sit below the zero axis.
pub struct MacdGoldenCross {
    descriptor: Strategy,
}

impl MacdGoldenCross {
    pub fn new() -> Self {
        Self {
            descriptor: Strategy {
                id: 2,
                name: "MACD golden cross".to_string(),
                description: "DIF crosses above DEA while both are below zero".to_string(),
                source: "builtin::macd_golden_cross".to_string(),
            },
        }
    }
}

impl Default for MacdGoldenCross {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyLogic for MacdGoldenCross {
    fn descriptor(&self) -> &Strategy {
        &self.descriptor
    }

    fn evaluate(
        &self,
        stock: &Stock,
        klines: &[KLine],
        indicators: &IndicatorSet,
    ) -> Result<Option<StockSignal>, ScanError> {
        let macd = &indicators.macd;
        let Some(last) = klines.last() else {
            return Ok(None);
        };
        if macd.len() < 2 {
            return Ok(None);
        }

        let i = macd.len() - 1;
        let crossed = macd.dif[i] > macd.dea[i] && macd.dif[i - 1] <= macd.dea[i - 1];
        let below_zero = macd.dif[i] < 0.0 && macd.dea[i] < 0.0;

        if crossed && below_zero {
            let reason = format!(
                "MACD golden cross below zero: DIF {:.3} over DEA {:.3}",
                macd.dif[i], macd.dea[i]
            );
            return Ok(Some(signal_from_latest(stock, last, reason)));
        }
        Ok(None)
    }
}

const BREAKOUT_LOOKBACK: usize = 20;
const BREAKOUT_VOLUME_RATIO: f64 = 2.0;

/// Volume breakout: latest close is the highest of the lookback window and
/// volume runs at least twice the prior average.
pub struct VolumeBreakout {
    descriptor: Strategy,
}

impl VolumeBreakout {
    pub fn new() -> Self {
        Self {
            descriptor: Strategy {
                id: 3,
                name: "Volume breakout".to_string(),
                description: "20-day closing high on at least twice the average volume"
                    .to_string(),
                source: "builtin::volume_breakout".to_string(),
            },
        }
    }
}

impl Default for VolumeBreakout {
    fn default() -> Self {
        Self::new()
    }
}

impl StrategyLogic for VolumeBreakout {
    fn descriptor(&self) -> &Strategy {
        &self.descriptor
    }

    fn evaluate(
        &self,
        stock: &Stock,
        klines: &[KLine],
        _indicators: &IndicatorSet,
    ) -> Result<Option<StockSignal>, ScanError> {
        if klines.len() < BREAKOUT_LOOKBACK {
            return Ok(None);
        }

        let window = &klines[klines.len() - BREAKOUT_LOOKBACK..];
        let last = &window[window.len() - 1];

        let is_high = window
            .iter()
            .take(window.len() - 1)
            .all(|bar| bar.close < last.close);

        let prior_avg_volume = window[..window.len() - 1]
            .iter()
            .map(|bar| bar.volume)
            .sum::<f64>()
            / (window.len() - 1) as f64;

        if is_high && prior_avg_volume > 0.0 {
            let ratio = last.volume / prior_avg_volume;
            if ratio >= BREAKOUT_VOLUME_RATIO {
                let reason = format!(
                    "{}-day closing high on {:.1}x average volume",
                    BREAKOUT_LOOKBACK, ratio
                );
                return Ok(Some(signal_from_latest(stock, last, reason)));
            }
        }
        Ok(None)
    }
}

/// The registered strategies, looked up by id.
pub struct StrategyCatalog {
    strategies: Vec<Arc<dyn StrategyLogic>>,
}

impl StrategyCatalog {
    /// Catalog of the bundled strategies.
    pub fn builtin() -> Self {
        Self {
            strategies: vec![
                Arc::new(KdjOversoldReversal::new()),
                Arc::new(MacdGoldenCross::new()),
                Arc::new(VolumeBreakout::new()),
            ],
        }
    }

    /// Catalog over caller-supplied strategies, for embedders registering
    /// their own logic.
    pub fn new(strategies: Vec<Arc<dyn StrategyLogic>>) -> Self {
        Self { strategies }
    }

    pub fn get(&self, id: u32) -> Result<Arc<dyn StrategyLogic>, ScanError> {
        self.strategies
            .iter()
            .find(|logic| logic.descriptor().id == id)
            .cloned()
            .ok_or(ScanError::StrategyNotFound { strategy_id: id })
    }

    /// Descriptors ordered by id.
    pub fn list(&self) -> Vec<Strategy> {
        let mut out: Vec<Strategy> = self
            .strategies
            .iter()
            .map(|logic| logic.descriptor().clone())
            .collect();
        out.sort_by_key(|strategy| strategy.id);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::{KdjSeries, MacdSeries};
    use chrono::NaiveDate;

    fn make_klines(close_volume: &[(f64, f64)]) -> Vec<KLine> {
        close_volume
            .iter()
            .enumerate()
            .map(|(i, &(close, volume))| KLine {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(i as u64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume,
                amount: close * volume,
                amplitude_pct: 1.0,
                change_pct: 0.5,
                change_amount: 0.1,
                turnover_pct: 2.0,
            })
            .collect()
    }

    fn flat_indicators(len: usize) -> IndicatorSet {
        IndicatorSet {
            kdj: KdjSeries {
                k: vec![50.0; len],
                d: vec![50.0; len],
                j: vec![50.0; len],
            },
            macd: MacdSeries {
                dif: vec![0.0; len],
                dea: vec![0.0; len],
                macd: vec![0.0; len],
            },
        }
    }

    fn sample_stock() -> Stock {
        Stock::new("600519", "Kweichow Moutai")
    }

    #[test]
    fn kdj_reversal_fires_on_cross_after_oversold() {
        let klines = make_klines(&[(10.0, 1000.0), (10.5, 1200.0)]);
        let mut indicators = flat_indicators(2);
        indicators.kdj = KdjSeries {
            k: vec![10.0, 25.0],
            d: vec![15.0, 18.0],
            j: vec![5.0, 39.0],
        };

        let signal = KdjOversoldReversal::new()
            .evaluate(&sample_stock(), &klines, &indicators)
            .unwrap()
            .expect("cross after oversold should signal");

        assert_eq!(signal.code, "600519");
        assert!((signal.price - 10.5).abs() < f64::EPSILON);
        assert!(signal.reason.contains("KDJ oversold reversal"));
    }

    #[test]
    fn kdj_reversal_quiet_without_oversold() {
        let klines = make_klines(&[(10.0, 1000.0), (10.5, 1200.0)]);
        let mut indicators = flat_indicators(2);
        // Same cross shape, but J never dipped to the floor.
        indicators.kdj = KdjSeries {
            k: vec![40.0, 55.0],
            d: vec![45.0, 48.0],
            j: vec![30.0, 69.0],
        };

        let signal = KdjOversoldReversal::new()
            .evaluate(&sample_stock(), &klines, &indicators)
            .unwrap();
        assert!(signal.is_none());
    }

    #[test]
    fn kdj_reversal_quiet_without_cross() {
        let klines = make_klines(&[(10.0, 1000.0), (10.5, 1200.0)]);
        let mut indicators = flat_indicators(2);
        // Oversold, but K stays under D.
        indicators.kdj = KdjSeries {
            k: vec![10.0, 12.0],
            d: vec![15.0, 14.0],
            j: vec![5.0, 8.0],
        };

        let signal = KdjOversoldReversal::new()
            .evaluate(&sample_stock(), &klines, &indicators)
            .unwrap();
        assert!(signal.is_none());
    }

    #[test]
    fn macd_cross_fires_below_zero() {
        let klines = make_klines(&[(10.0, 1000.0), (10.2, 1100.0)]);
        let mut indicators = flat_indicators(2);
        indicators.macd = MacdSeries {
            dif: vec![-0.50, -0.20],
            dea: vec![-0.30, -0.25],
            macd: vec![-0.40, 0.10],
        };

        let signal = MacdGoldenCross::new()
            .evaluate(&sample_stock(), &klines, &indicators)
            .unwrap()
            .expect("cross below zero should signal");
        assert!(signal.reason.contains("MACD golden cross"));
    }

    #[test]
    fn macd_cross_quiet_above_zero() {
        let klines = make_klines(&[(10.0, 1000.0), (10.2, 1100.0)]);
        let mut indicators = flat_indicators(2);
        indicators.macd = MacdSeries {
            dif: vec![0.10, 0.40],
            dea: vec![0.20, 0.30],
            macd: vec![-0.20, 0.20],
        };

        let signal = MacdGoldenCross::new()
            .evaluate(&sample_stock(), &klines, &indicators)
            .unwrap();
        assert!(signal.is_none());
    }

    #[test]
    fn volume_breakout_fires_on_high_with_volume() {
        let mut bars: Vec<(f64, f64)> = vec![(100.0, 1000.0); 24];
        bars.push((105.0, 3000.0));
        let klines = make_klines(&bars);
        let indicators = flat_indicators(klines.len());

        let signal = VolumeBreakout::new()
            .evaluate(&sample_stock(), &klines, &indicators)
            .unwrap()
            .expect("new high on heavy volume should signal");
        assert!(signal.reason.contains("closing high"));
        assert!(signal.reason.contains("3.0x"));
    }

    #[test]
    fn volume_breakout_quiet_on_light_volume() {
        let mut bars: Vec<(f64, f64)> = vec![(100.0, 1000.0); 24];
        bars.push((105.0, 1500.0));
        let klines = make_klines(&bars);
        let indicators = flat_indicators(klines.len());

        let signal = VolumeBreakout::new()
            .evaluate(&sample_stock(), &klines, &indicators)
            .unwrap();
        assert!(signal.is_none());
    }

    #[test]
    fn volume_breakout_quiet_when_not_a_high() {
        let mut bars: Vec<(f64, f64)> = vec![(100.0, 1000.0); 24];
        bars.push((99.0, 3000.0));
        let klines = make_klines(&bars);
        let indicators = flat_indicators(klines.len());

        let signal = VolumeBreakout::new()
            .evaluate(&sample_stock(), &klines, &indicators)
            .unwrap();
        assert!(signal.is_none());
    }

    #[test]
    fn catalog_lists_builtins_by_id() {
        let catalog = StrategyCatalog::builtin();
        let listed = catalog.list();

        let ids: Vec<u32> = listed.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(listed[0].name, "KDJ oversold reversal");
    }

    #[test]
    fn catalog_get_unknown_id() {
        let catalog = StrategyCatalog::builtin();
        let err = catalog.get(99).unwrap_err();
        assert!(matches!(
            err,
            ScanError::StrategyNotFound { strategy_id: 99 }
        ));
    }

    #[test]
    fn catalog_get_returns_matching_strategy() {
        let catalog = StrategyCatalog::builtin();
        let logic = catalog.get(2).unwrap();
        assert_eq!(logic.descriptor().name, "MACD golden cross");
    }
}
