//! EMA (Exponential Moving Average) indicator

use crate::error::EngineError;
use ta::indicators::ExponentialMovingAverage;
use ta::Next;

/// Calculate EMA for every point of `series`.
///
/// Uses `k = 2 / (period + 1)` and seeds with `series[0]` rather than an
/// SMA of the first `period` values, so the output has the input's length.
pub fn ema(series: &[f64], period: usize) -> Result<Vec<f64>, EngineError> {
    let mut inner = ExponentialMovingAverage::new(period)
        .map_err(|e| EngineError::InvalidParameter(format!("EMA period {}: {:?}", period, e)))?;

    Ok(series.iter().map(|&value| inner.next(value)).collect())
}
