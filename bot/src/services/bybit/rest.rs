use super::{candle_from_row, interval_code, kline_topic};
use crate::services::bybit::stream::StreamCommand;
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use shared::Config;
use signal_engine::prelude::*;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Bybit caps kline requests at this many rows
const MAX_KLINE_LIMIT: usize = 1000;

#[derive(Debug, Deserialize)]
struct BybitResponse<T> {
    #[serde(rename = "retCode")]
    ret_code: i32,
    #[serde(rename = "retMsg")]
    ret_msg: String,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct KlineResult {
    #[serde(default)]
    list: Vec<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct TickerResult {
    #[serde(default)]
    list: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
struct Ticker {
    symbol: String,
    #[serde(rename = "volume24h", default)]
    volume_24h: String,
}

/// [`MarketDataSource`] over the Bybit REST API, driving a [`super::BybitStream`]
pub struct BybitMarketData {
    client: reqwest::Client,
    rest_url: String,
    category: String,
    commands: mpsc::UnboundedSender<StreamCommand>,
}

impl BybitMarketData {
    /// Build the REST side and the WebSocket task that feeds `events`
    pub fn new(
        config: &Config,
        events: mpsc::Sender<MarketEvent>,
    ) -> anyhow::Result<(Self, super::BybitStream)> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs.max(1)))
            .build()?;
        let (commands, commands_rx) = mpsc::unbounded_channel();

        let market = Self {
            client,
            rest_url: config.bybit_rest_url.trim_end_matches('/').to_string(),
            category: config.bybit_category.clone(),
            commands,
        };
        let stream = super::BybitStream::new(config.bybit_ws_url.clone(), commands_rx, events);
        Ok((market, stream))
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, EngineError> {
        let url = format!("{}{}", self.rest_url, path);
        let response: BybitResponse<T> = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| EngineError::Network(e.into()))?
            .json()
            .await
            .map_err(|e| EngineError::Network(e.into()))?;

        if response.ret_code != 0 {
            return Err(EngineError::Network(anyhow!(
                "bybit {} failed: {} ({})",
                path,
                response.ret_msg,
                response.ret_code
            )));
        }
        response
            .result
            .ok_or_else(|| EngineError::DataUnavailable(format!("bybit {} returned no result", path)))
    }

    fn send_command(&self, command: StreamCommand) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::Network(anyhow!("market stream task is not running")))
    }
}

/// Symbols quoted in USDT without digits, highest 24h volume first
fn rank_by_volume(tickers: Vec<Ticker>, count: usize) -> Vec<String> {
    let mut ranked: Vec<(String, f64)> = tickers
        .into_iter()
        .filter(|t| t.symbol.ends_with("USDT"))
        .filter(|t| !t.symbol.chars().any(|c| c.is_ascii_digit()))
        .filter_map(|t| t.volume_24h.parse::<f64>().ok().map(|v| (t.symbol, v)))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked.into_iter().take(count).map(|(s, _)| s).collect()
}

#[async_trait]
impl MarketDataSource for BybitMarketData {
    async fn fetch_historical_candles(
        &self,
        pair: &Pair,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError> {
        // One extra row makes up for the still-open candle
        let request_limit = (limit + 1).min(MAX_KLINE_LIMIT);
        let result: KlineResult = self
            .get(
                "/v5/market/kline",
                &[
                    ("category", self.category.clone()),
                    ("symbol", pair.symbol.clone()),
                    ("interval", interval_code(pair.interval).to_string()),
                    ("limit", request_limit.to_string()),
                ],
            )
            .await?;

        let now = Utc::now();
        let mut candles: Vec<Candle> = result
            .list
            .iter()
            .filter_map(|row| candle_from_row(row))
            .filter(|c| c.close_time(pair.interval) <= now)
            .collect();
        candles.sort_by_key(|c| c.start_time);
        let skip = candles.len().saturating_sub(limit);
        let candles: Vec<Candle> = candles.into_iter().skip(skip).collect();

        debug!("Fetched {} closed candles for {}", candles.len(), pair);
        Ok(candles)
    }

    async fn subscribe(&self, pair: &Pair) -> Result<(), EngineError> {
        debug!("Subscribing {}", kline_topic(pair));
        self.send_command(StreamCommand::Subscribe(pair.clone()))
    }

    async fn unsubscribe(&self, pair: &Pair) -> Result<(), EngineError> {
        debug!("Unsubscribing {}", kline_topic(pair));
        self.send_command(StreamCommand::Unsubscribe(pair.clone()))
    }

    async fn top_volume_symbols(&self, count: usize) -> Result<Vec<String>, EngineError> {
        let result: TickerResult = self
            .get("/v5/market/tickers", &[("category", self.category.clone())])
            .await?;
        Ok(rank_by_volume(result.list, count))
    }
}
