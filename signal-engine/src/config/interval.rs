//! Candle intervals and the static per-interval signal table

use crate::error::EngineError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported candle interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "3m")]
    M3,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "2h")]
    H2,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "6h")]
    H6,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
    #[serde(rename = "1M")]
    Month1,
}

/// Take profit, validity and confirmation interval for signals on one interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalConfig {
    /// Favorable move (percent) that resolves a signal as success
    pub take_profit_percent: f64,
    /// Hours after entry at which an unresolved signal fails
    pub validity_hours: u32,
    /// Coarser interval used for confirmation, if any
    pub higher_timeframe: Option<Interval>,
}

impl Interval {
    pub const ALL: [Interval; 12] = [
        Interval::M1,
        Interval::M3,
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::H1,
        Interval::H2,
        Interval::H4,
        Interval::H6,
        Interval::D1,
        Interval::W1,
        Interval::Month1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M3 => "3m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H2 => "2h",
            Interval::H4 => "4h",
            Interval::H6 => "6h",
            Interval::D1 => "1d",
            Interval::W1 => "1w",
            Interval::Month1 => "1M",
        }
    }

    /// Interval length in minutes (a month counts as 30 days)
    pub fn minutes(&self) -> i64 {
        match self {
            Interval::M1 => 1,
            Interval::M3 => 3,
            Interval::M5 => 5,
            Interval::M15 => 15,
            Interval::M30 => 30,
            Interval::H1 => 60,
            Interval::H2 => 120,
            Interval::H4 => 240,
            Interval::H6 => 360,
            Interval::D1 => 1_440,
            Interval::W1 => 10_080,
            Interval::Month1 => 43_200,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    pub fn config(&self) -> IntervalConfig {
        let (take_profit_percent, validity_hours) = match self {
            Interval::M1 => (0.6, 1),
            Interval::M3 => (0.8, 1),
            Interval::M5 => (1.0, 1),
            Interval::M15 => (1.5, 2),
            Interval::M30 => (2.0, 2),
            Interval::H1 => (2.5, 4),
            Interval::H2 => (3.0, 8),
            Interval::H4 => (3.5, 16),
            Interval::H6 => (4.0, 32),
            Interval::D1 => (5.0, 96),
            Interval::W1 => (8.0, 168),
            Interval::Month1 => (10.0, 720),
        };
        IntervalConfig {
            take_profit_percent,
            validity_hours,
            higher_timeframe: self.higher_timeframe(),
        }
    }

    /// Next coarser interval in the confirmation chain
    pub fn higher_timeframe(&self) -> Option<Interval> {
        match self {
            Interval::M1 => Some(Interval::M3),
            Interval::M3 => Some(Interval::M5),
            Interval::M5 => Some(Interval::M15),
            Interval::M15 => Some(Interval::M30),
            Interval::M30 => Some(Interval::H1),
            Interval::H1 => Some(Interval::H2),
            Interval::H2 => Some(Interval::H4),
            Interval::H4 => Some(Interval::H6),
            Interval::H6 => Some(Interval::D1),
            Interval::D1 => Some(Interval::W1),
            Interval::W1 => Some(Interval::Month1),
            Interval::Month1 => None,
        }
    }

    /// Comma separated list used in user-facing errors
    pub fn supported_list() -> String {
        Interval::ALL
            .iter()
            .map(|i| i.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = EngineError;

    /// `1M` is a month, every other form is matched case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "1M" {
            return Ok(Interval::Month1);
        }
        let lower = trimmed.to_lowercase();
        Interval::ALL
            .iter()
            .copied()
            .find(|i| i.as_str() == lower)
            .ok_or_else(|| EngineError::UnsupportedInterval(trimmed.to_string()))
    }
}
