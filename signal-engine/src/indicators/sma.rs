//! SMA (Simple Moving Average) indicator

use ta::indicators::SimpleMovingAverage;
use ta::Next;

/// SMA values for every full window of `period` values.
///
/// The result has `len - period + 1` entries; it is empty when the series is
/// shorter than one window or the period is zero.
pub fn sma_series(values: &[f64], period: usize) -> Vec<f64> {
    let mut inner = match SimpleMovingAverage::new(period) {
        Ok(sma) => sma,
        Err(_) => return Vec::new(),
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| (i, inner.next(value)))
        .filter(|(i, _)| i + 1 >= period)
        .map(|(_, avg)| avg)
        .collect()
}

/// Latest value of SMA(SMA(values, period), period).
///
/// Returns `None` (not an error) when fewer than `2 * period` values exist.
pub fn smoothed_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period * 2 {
        return None;
    }

    let first_pass = sma_series(values, period);
    sma_series(&first_pass, period).last().copied()
}
