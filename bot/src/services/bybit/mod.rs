//! Bybit v5 market data adapter
//!
//! REST for history and tickers, one public WebSocket connection for live
//! klines. Payloads are validated here and turned into [`MarketEvent`]s
//! before they reach the engine.

mod rest;
mod stream;

pub use rest::BybitMarketData;
pub use stream::BybitStream;

use chrono::{DateTime, Utc};
use signal_engine::prelude::{Candle, Interval, Pair};

/// Interval code used in Bybit kline requests and topics
pub fn interval_code(interval: Interval) -> &'static str {
    match interval {
        Interval::M1 => "1",
        Interval::M3 => "3",
        Interval::M5 => "5",
        Interval::M15 => "15",
        Interval::M30 => "30",
        Interval::H1 => "60",
        Interval::H2 => "120",
        Interval::H4 => "240",
        Interval::H6 => "360",
        Interval::D1 => "D",
        Interval::W1 => "W",
        Interval::Month1 => "M",
    }
}

pub fn kline_topic(pair: &Pair) -> String {
    format!("kline.{}.{}", interval_code(pair.interval), pair.symbol)
}

/// Candle from a REST kline row `[start, open, high, low, close, volume, turnover]`
pub(crate) fn candle_from_row(row: &[String]) -> Option<Candle> {
    if row.len() < 7 {
        return None;
    }
    let start_ms: i64 = row[0].parse().ok()?;
    Some(Candle::new(
        DateTime::<Utc>::from_timestamp_millis(start_ms)?,
        row[1].parse().ok()?,
        row[2].parse().ok()?,
        row[3].parse().ok()?,
        row[4].parse().ok()?,
        row[5].parse().ok()?,
        row[6].parse().ok()?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kline_topic() {
        assert_eq!(kline_topic(&Pair::new("btcusdt", Interval::H1)), "kline.60.BTCUSDT");
        assert_eq!(kline_topic(&Pair::new("ETHUSDT", Interval::Month1)), "kline.M.ETHUSDT");
    }

    #[test]
    fn test_candle_from_row() {
        let row: Vec<String> = ["1735689600000", "100.5", "101", "99.5", "100.8", "12.5", "1260"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let candle = candle_from_row(&row).unwrap();
        assert_eq!(candle.start_time.timestamp_millis(), 1_735_689_600_000);
        assert_eq!(candle.close, 100.8);
        assert_eq!(candle.turnover, 1260.0);

        assert!(candle_from_row(&row[..5]).is_none());
        let mut broken = row.clone();
        broken[4] = "n/a".to_string();
        assert!(candle_from_row(&broken).is_none());
    }
}
