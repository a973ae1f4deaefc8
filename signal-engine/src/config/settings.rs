//! Engine settings

use crate::config::Interval;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for indicators, signal filters and the stream manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// MACD fast EMA period
    pub fast_period: usize,
    /// MACD slow EMA period
    pub slow_period: usize,
    /// MACD signal line period
    pub signal_period: usize,
    /// Period of both passes of the smoothed volume SMA
    pub volume_sma_period: usize,
    /// Histogram values that must share the latest sign
    pub direction_candles: usize,
    /// Volume change (percent) accepted when the smoothed volume SMA is rising
    pub volume_change_percent: f64,
    /// Volume change (percent) accepted on its own
    pub volume_spike_percent: f64,
    /// Candles fetched to warm up a new pair
    pub history_candles: usize,
    /// Rolling window capacity per pair
    pub window_capacity: usize,
    /// Candles fetched for the higher timeframe check
    pub htf_candles: usize,
    /// Chat that receives signals for the top-volume symbols
    pub broadcast_channel_id: Option<i64>,
    /// Intervals tracked for the top-volume symbols
    pub broadcast_intervals: Vec<Interval>,
    /// Number of top-volume symbols to broadcast
    pub top_volume_count: usize,
    pub top_volume_refresh_hours: u64,
    pub reconcile_interval_secs: u64,
    /// Terminal signals older than this are deleted
    pub retention_days: u32,
    pub warmup_timeout_secs: u64,
    /// Capacity of each pair worker queue
    pub worker_queue: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
            volume_sma_period: 9,
            direction_candles: 3,
            volume_change_percent: 10.0,
            volume_spike_percent: 50.0,
            history_candles: 300,
            window_capacity: 300,
            htf_candles: 100,
            broadcast_channel_id: None,
            broadcast_intervals: vec![Interval::M15],
            top_volume_count: 10,
            top_volume_refresh_hours: 4,
            reconcile_interval_secs: 300,
            retention_days: 30,
            warmup_timeout_secs: 30,
            worker_queue: 256,
        }
    }
}

/// Indicator periods a pair window recomputes with on every candle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
    pub volume_sma_period: usize,
}

impl EngineSettings {
    pub fn indicator_params(&self) -> IndicatorParams {
        IndicatorParams {
            fast_period: self.fast_period,
            slow_period: self.slow_period,
            signal_period: self.signal_period,
            volume_sma_period: self.volume_sma_period,
        }
    }

    pub fn warmup_timeout(&self) -> Duration {
        Duration::from_secs(self.warmup_timeout_secs)
    }

    pub fn reconcile_every(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }

    pub fn top_volume_refresh_every(&self) -> Duration {
        Duration::from_secs(self.top_volume_refresh_hours.max(1) * 3600)
    }
}
