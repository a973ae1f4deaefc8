//! Signal candidate generation
//!
//! A candidate is a momentum reversal: the histogram has held one sign for
//! the last few candles and is now shrinking, volume confirms, and the
//! higher timeframe agrees with the reversal.

use crate::config::EngineSettings;
use crate::data::Pair;
use crate::error::EngineError;
use crate::indicators::macd;
use crate::lifecycle::Side;
use crate::ports::MarketDataSource;
use crate::strategy::PairState;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Confirmed setup on a closed candle, not yet bound to any scope
#[derive(Debug, Clone, PartialEq)]
pub struct SignalCandidate {
    pub side: Side,
    /// Close of the signal candle
    pub entry_price: f64,
    pub pair: Pair,
    /// Close time of the signal candle
    pub time: DateTime<Utc>,
}

/// The last `k` histogram values share the non-zero sign of the latest one
pub fn direction_confirmed(histogram: &[f64], k: usize) -> bool {
    if k == 0 || histogram.len() < k {
        return false;
    }
    let latest = histogram[histogram.len() - 1];
    if latest == 0.0 {
        return false;
    }
    let positive = latest > 0.0;
    histogram[histogram.len() - k..]
        .iter()
        .all(|&h| if positive { h > 0.0 } else { h < 0.0 })
}

/// Higher timeframe agrees with a reversal to `side`.
///
/// Long wants the coarser histogram positive, or negative and shrinking;
/// short is the mirror image.
pub fn higher_timeframe_confirms(side: Side, histogram: &[f64]) -> bool {
    let len = histogram.len();
    if len < 2 {
        return false;
    }
    let latest = histogram[len - 1];
    let shrinking = latest.abs() < histogram[len - 2].abs();
    match side {
        Side::Long => latest > 0.0 || (latest < 0.0 && shrinking),
        Side::Short => latest < 0.0 || (latest > 0.0 && shrinking),
    }
}

/// Volume rule: a moderate increase with a rising smoothed SMA, or a spike
pub fn volume_confirmed(
    change_percent: Option<f64>,
    sma_rising: bool,
    change_threshold: f64,
    spike_threshold: f64,
) -> bool {
    match change_percent {
        Some(pct) => (pct > change_threshold && sma_rising) || pct > spike_threshold,
        None => false,
    }
}

pub struct SignalGenerator {
    settings: Arc<EngineSettings>,
    source: Arc<dyn MarketDataSource>,
}

impl SignalGenerator {
    pub fn new(settings: Arc<EngineSettings>, source: Arc<dyn MarketDataSource>) -> Self {
        Self { settings, source }
    }

    /// Evaluate the latest candle of `state`.
    ///
    /// The momentum reference is advanced on every call. The higher
    /// timeframe is only fetched when `wanted` is set, i.e. some scope of
    /// the pair could take a new signal.
    pub async fn evaluate(
        &self,
        state: &mut PairState,
        wanted: bool,
    ) -> Result<Option<SignalCandidate>, EngineError> {
        let candle = match state.latest_candle() {
            Some(candle) => candle.clone(),
            None => return Ok(None),
        };
        let latest = match state.histogram().last() {
            Some(&h) => h,
            None => {
                return Err(EngineError::InsufficientData {
                    needed: self.settings.slow_period,
                    got: state.len(),
                })
            }
        };
        let previous_abs = state.replace_previous_histogram_abs(latest.abs());
        let pair = state.pair().clone();

        if !direction_confirmed(state.histogram(), self.settings.direction_candles) {
            return Ok(None);
        }
        if latest.abs() >= previous_abs {
            debug!("{}: histogram not fading ({:.6} >= {:.6})", pair, latest.abs(), previous_abs);
            return Ok(None);
        }
        let change = state.volume_change_percent();
        if !volume_confirmed(
            change,
            state.volume_sma_rising(),
            self.settings.volume_change_percent,
            self.settings.volume_spike_percent,
        ) {
            debug!("{}: volume not confirmed (change: {:?})", pair, change);
            return Ok(None);
        }
        if !wanted {
            debug!("{}: setup found but every scope has an active signal", pair);
            return Ok(None);
        }

        let side = if latest > 0.0 { Side::Short } else { Side::Long };
        let htf_histogram = self.higher_timeframe_histogram(&pair).await?;
        if !higher_timeframe_confirms(side, &htf_histogram) {
            debug!("{}: higher timeframe rejects {}", pair, side);
            return Ok(None);
        }

        let time = candle.close_time(pair.interval);
        info!(
            "{} candidate on {}: price={:.4}, histogram={:.6}, volume change={:.1}%",
            side,
            pair,
            candle.close,
            latest,
            change.unwrap_or_default()
        );

        Ok(Some(SignalCandidate {
            side,
            entry_price: candle.close,
            pair,
            time,
        }))
    }

    async fn higher_timeframe_histogram(&self, pair: &Pair) -> Result<Vec<f64>, EngineError> {
        let htf = pair.interval.higher_timeframe().ok_or_else(|| {
            EngineError::DataUnavailable(format!("no higher timeframe for {}", pair.interval))
        })?;
        let htf_pair = pair.with_interval(htf);

        let candles = self
            .source
            .fetch_historical_candles(&htf_pair, self.settings.htf_candles)
            .await?;
        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();

        let series = macd(
            &closes,
            self.settings.fast_period,
            self.settings.slow_period,
            self.settings.signal_period,
        )
        .map_err(|e| EngineError::DataUnavailable(format!("{}: {}", htf_pair, e)))?;

        Ok(series.histogram)
    }
}
