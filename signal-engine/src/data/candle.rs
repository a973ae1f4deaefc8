//! OHLCV candle data structures

use crate::config::Interval;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed OHLCV candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Candle open time
    pub start_time: DateTime<Utc>,
    /// Opening price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Closing price
    pub close: f64,
    /// Volume in base currency
    pub volume: f64,
    /// Turnover in quote currency
    pub turnover: f64,
}

impl Candle {
    /// Create a new candle
    pub fn new(
        start_time: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
        turnover: f64,
    ) -> Self {
        Self {
            start_time,
            open,
            high,
            low,
            close,
            volume,
            turnover,
        }
    }

    /// Time at which the candle closed for the given interval
    pub fn close_time(&self, interval: Interval) -> DateTime<Utc> {
        self.start_time + interval.duration()
    }
}

/// One independently tracked market-data stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pair {
    pub symbol: String,
    pub interval: Interval,
}

impl Pair {
    pub fn new(symbol: &str, interval: Interval) -> Self {
        Self {
            symbol: symbol.trim().to_uppercase(),
            interval,
        }
    }

    /// Same symbol on another interval
    pub fn with_interval(&self, interval: Interval) -> Self {
        Self {
            symbol: self.symbol.clone(),
            interval,
        }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.interval)
    }
}

/// Validated event coming out of a market data source
#[derive(Debug, Clone)]
pub enum MarketEvent {
    /// A candle that the exchange has confirmed as closed
    ClosedCandle { pair: Pair, candle: Candle },
    /// The upstream connection was re-established; history may have gaps
    StreamRestarted,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_pair_normalizes_symbol() {
        let pair = Pair::new(" btcusdt ", Interval::M15);
        assert_eq!(pair.symbol, "BTCUSDT");
        assert_eq!(pair.to_string(), "BTCUSDT@15m");
        assert_eq!(pair.with_interval(Interval::M30).interval, Interval::M30);
    }

    #[test]
    fn test_close_time() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let candle = Candle::new(start, 100.0, 110.0, 95.0, 105.0, 1000.0, 105_000.0);
        assert_eq!(
            candle.close_time(Interval::H1),
            Utc.with_ymd_and_hms(2025, 1, 1, 1, 0, 0).unwrap()
        );
    }
}
