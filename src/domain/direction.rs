//! Price-move direction and neutral-band classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Direction of a price move over some horizon. `Shock` is sideways
/// movement inside the neutral band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Shock,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
            Direction::Shock => write!(f, "shock"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "shock" => Ok(Direction::Shock),
            other => Err(format!("unknown direction '{other}' (up, down, shock)")),
        }
    }
}

/// Classify a percent change against a neutral band of `neutral_band_pct`
/// (both in percent). Boundaries are inclusive on both sides:
/// `change_pct >= +band` is `Up`, `change_pct <= -band` is `Down`,
/// everything strictly inside the band is `Shock`.
pub fn classify(change_pct: f64, neutral_band_pct: f64) -> Direction {
    if change_pct >= neutral_band_pct {
        Direction::Up
    } else if change_pct <= -neutral_band_pct {
        Direction::Down
    } else {
        Direction::Shock
    }
}
