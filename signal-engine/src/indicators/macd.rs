//! MACD (Moving Average Convergence Divergence) indicator

use crate::error::EngineError;
use crate::indicators::ema;

/// MACD result series, each aligned with the input closes
#[derive(Debug, Clone, PartialEq)]
pub struct MacdSeries {
    /// EMA(fast) - EMA(slow)
    pub macd_line: Vec<f64>,
    /// EMA(signal) of the MACD line
    pub signal_line: Vec<f64>,
    /// MACD line - signal line
    pub histogram: Vec<f64>,
}

impl MacdSeries {
    pub fn latest_histogram(&self) -> Option<f64> {
        self.histogram.last().copied()
    }

    /// Histogram value one candle before the latest
    pub fn previous_histogram(&self) -> Option<f64> {
        let len = self.histogram.len();
        if len < 2 {
            return None;
        }
        self.histogram.get(len - 2).copied()
    }
}

/// Calculate MACD over closing prices ordered oldest to newest.
///
/// Fails with [`EngineError::InsufficientData`] when fewer than
/// `slow_period` closes are given.
pub fn macd(
    close_prices: &[f64],
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
) -> Result<MacdSeries, EngineError> {
    if close_prices.len() < slow_period {
        return Err(EngineError::InsufficientData {
            needed: slow_period,
            got: close_prices.len(),
        });
    }

    let fast = ema(close_prices, fast_period)?;
    let slow = ema(close_prices, slow_period)?;

    let macd_line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal_line = ema(&macd_line, signal_period)?;
    let histogram = macd_line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();

    Ok(MacdSeries {
        macd_line,
        signal_line,
        histogram,
    })
}
