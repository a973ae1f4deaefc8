//! Rolling per-pair window and the indicator history derived from it

use crate::config::IndicatorParams;
use crate::data::{Candle, Pair};
use crate::indicators::{macd, smoothed_sma};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::debug;

/// Smoothed volume SMA samples kept for trend comparison
const VOLUME_SMA_SAMPLES: usize = 2;

/// State of one tracked pair, owned by that pair's worker
#[derive(Debug, Clone)]
pub struct PairState {
    pair: Pair,
    params: IndicatorParams,
    capacity: usize,
    window: VecDeque<Candle>,
    histogram: Vec<f64>,
    volume_sma: VecDeque<f64>,
    previous_histogram_abs: f64,
}

impl PairState {
    pub fn new(pair: Pair, params: IndicatorParams, capacity: usize) -> Self {
        Self {
            pair,
            params,
            capacity: capacity.max(1),
            window: VecDeque::with_capacity(capacity),
            histogram: Vec::new(),
            volume_sma: VecDeque::with_capacity(VOLUME_SMA_SAMPLES),
            previous_histogram_abs: 0.0,
        }
    }

    /// Replace the window with historical candles.
    ///
    /// Candles are ordered by start time and duplicates removed. The
    /// momentum reference starts at the last histogram magnitude.
    pub fn seed(&mut self, mut candles: Vec<Candle>) {
        candles.sort_by_key(|c| c.start_time);
        candles.dedup_by_key(|c| c.start_time);
        let skip = candles.len().saturating_sub(self.capacity);

        self.window = candles.into_iter().skip(skip).collect();
        self.volume_sma.clear();
        self.recompute();
        self.previous_histogram_abs = self.histogram.last().map(|h| h.abs()).unwrap_or(0.0);

        debug!(
            "Seeded {} with {} candles (histogram: {} values)",
            self.pair,
            self.window.len(),
            self.histogram.len()
        );
    }

    /// Re-seed from fresh history without losing newer live candles.
    ///
    /// Candles already in the window that start after the newest history
    /// candle arrived while the history was being fetched; they are kept.
    pub fn reseed(&mut self, history: Vec<Candle>) {
        let Some(newest) = history.iter().map(|c| c.start_time).max() else {
            debug!("{}: empty history, keeping current window", self.pair);
            return;
        };

        let live: Vec<Candle> = self
            .window
            .iter()
            .filter(|c| c.start_time > newest)
            .cloned()
            .collect();
        let mut candles = history;
        candles.extend(live);
        self.seed(candles);
    }

    /// Append a closed candle and recompute indicators.
    ///
    /// Returns `false` for a candle that is not newer than the last one.
    pub fn apply(&mut self, candle: Candle) -> bool {
        if let Some(last) = self.last_start_time() {
            if candle.start_time <= last {
                return false;
            }
        }

        self.window.push_back(candle);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
        self.recompute();
        true
    }

    fn recompute(&mut self) {
        let closes: Vec<f64> = self.window.iter().map(|c| c.close).collect();
        self.histogram = match macd(
            &closes,
            self.params.fast_period,
            self.params.slow_period,
            self.params.signal_period,
        ) {
            Ok(series) => series.histogram,
            Err(_) => Vec::new(),
        };

        let volumes: Vec<f64> = self.window.iter().map(|c| c.volume).collect();
        if let Some(sample) = smoothed_sma(&volumes, self.params.volume_sma_period) {
            self.volume_sma.push_back(sample);
            while self.volume_sma.len() > VOLUME_SMA_SAMPLES {
                self.volume_sma.pop_front();
            }
        }
    }

    pub fn pair(&self) -> &Pair {
        &self.pair
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn latest_candle(&self) -> Option<&Candle> {
        self.window.back()
    }

    pub fn last_start_time(&self) -> Option<DateTime<Utc>> {
        self.window.back().map(|c| c.start_time)
    }

    /// MACD histogram over the window, empty until enough candles exist
    pub fn histogram(&self) -> &[f64] {
        &self.histogram
    }

    /// Most recent smoothed volume SMA samples, oldest first
    pub fn volume_sma(&self) -> &VecDeque<f64> {
        &self.volume_sma
    }

    /// Smoothed volume SMA is rising between its two latest samples
    pub fn volume_sma_rising(&self) -> bool {
        match (self.volume_sma.front(), self.volume_sma.back()) {
            (Some(prev), Some(last)) if self.volume_sma.len() == VOLUME_SMA_SAMPLES => last > prev,
            _ => false,
        }
    }

    /// Percent change of the latest volume over the previous one
    pub fn volume_change_percent(&self) -> Option<f64> {
        let len = self.window.len();
        if len < 2 {
            return None;
        }
        let prev = self.window[len - 2].volume;
        let last = self.window[len - 1].volume;
        if prev == 0.0 {
            return None;
        }
        Some((last - prev) / prev * 100.0)
    }

    pub fn previous_histogram_abs(&self) -> f64 {
        self.previous_histogram_abs
    }

    /// Store a new momentum reference, returning the old one
    pub fn replace_previous_histogram_abs(&mut self, value: f64) -> f64 {
        std::mem::replace(&mut self.previous_histogram_abs, value)
    }
}
