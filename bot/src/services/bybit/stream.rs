use super::kline_topic;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use signal_engine::prelude::{Candle, MarketEvent, Pair};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::Instant;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Topics per subscribe request
const SUBSCRIBE_CHUNK: usize = 10;
const PING_INTERVAL: Duration = Duration::from_secs(20);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub(crate) enum StreamCommand {
    Subscribe(Pair),
    Unsubscribe(Pair),
}

#[derive(Debug, Deserialize)]
struct WsMessage {
    topic: Option<String>,
    #[serde(default)]
    data: Vec<WsKline>,
    op: Option<String>,
    success: Option<bool>,
    ret_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsKline {
    start: i64,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
    turnover: String,
    confirm: bool,
}

impl WsKline {
    fn to_candle(&self) -> Option<Candle> {
        Some(Candle::new(
            DateTime::<Utc>::from_timestamp_millis(self.start)?,
            self.open.parse().ok()?,
            self.high.parse().ok()?,
            self.low.parse().ok()?,
            self.close.parse().ok()?,
            self.volume.parse().ok()?,
            self.turnover.parse().ok()?,
        ))
    }
}

/// Confirmed candles in a kline push; open candles and unknown topics are dropped
fn closed_candles(text: &str, topics: &HashMap<String, Pair>) -> Vec<MarketEvent> {
    let message: WsMessage = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            debug!("Ignoring unparseable stream message: {}", e);
            return Vec::new();
        }
    };

    if let Some(op) = &message.op {
        if message.success == Some(false) {
            warn!("Stream {} rejected: {}", op, message.ret_msg.unwrap_or_default());
        }
        return Vec::new();
    }

    let Some(pair) = message.topic.as_ref().and_then(|t| topics.get(t)) else {
        return Vec::new();
    };

    message
        .data
        .iter()
        .filter(|k| k.confirm)
        .filter_map(|k| match k.to_candle() {
            Some(candle) => Some(MarketEvent::ClosedCandle {
                pair: pair.clone(),
                candle,
            }),
            None => {
                warn!("Malformed kline for {}", pair);
                None
            }
        })
        .collect()
}

fn op_message(op: &str, topics: &[String]) -> Message {
    Message::Text(serde_json::json!({ "op": op, "args": topics }).to_string())
}

enum Disconnect {
    /// Command channel closed; the process is shutting down
    Shutdown,
    Lost,
}

/// Single public WebSocket carrying every subscribed kline topic
pub struct BybitStream {
    url: String,
    commands: mpsc::UnboundedReceiver<StreamCommand>,
    events: mpsc::Sender<MarketEvent>,
    topics: HashMap<String, Pair>,
}

impl BybitStream {
    pub(crate) fn new(
        url: String,
        commands: mpsc::UnboundedReceiver<StreamCommand>,
        events: mpsc::Sender<MarketEvent>,
    ) -> Self {
        Self {
            url,
            commands,
            events,
            topics: HashMap::new(),
        }
    }

    /// Keep the connection alive until the market data handle is dropped
    pub async fn run(mut self) {
        let mut backoff = Duration::from_secs(1);
        let mut connected_before = false;

        loop {
            if !self.drain_commands() {
                info!("Market stream stopped");
                return;
            }

            match connect_async(self.url.as_str()).await {
                Ok((ws, _)) => {
                    info!("Market stream connected ({} topics)", self.topics.len());
                    backoff = Duration::from_secs(1);
                    if connected_before && self.events.send(MarketEvent::StreamRestarted).await.is_err() {
                        return;
                    }
                    connected_before = true;

                    match self.session(ws).await {
                        Disconnect::Shutdown => {
                            info!("Market stream stopped");
                            return;
                        }
                        Disconnect::Lost => warn!("Market stream disconnected"),
                    }
                }
                Err(e) => error!("Market stream connection failed: {}", e),
            }

            if !self.wait_backoff(backoff).await {
                info!("Market stream stopped");
                return;
            }
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    /// Apply queued commands; `false` once the command channel is closed
    fn drain_commands(&mut self) -> bool {
        loop {
            match self.commands.try_recv() {
                Ok(command) => {
                    self.apply_command(command);
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    /// Sleep before reconnecting while still taking commands
    async fn wait_backoff(&mut self, backoff: Duration) -> bool {
        let deadline = Instant::now() + backoff;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return true,
                command = self.commands.recv() => match command {
                    Some(command) => {
                        self.apply_command(command);
                    }
                    None => return false,
                },
            }
        }
    }

    fn apply_command(&mut self, command: StreamCommand) -> Option<Message> {
        match command {
            StreamCommand::Subscribe(pair) => {
                let topic = kline_topic(&pair);
                if self.topics.insert(topic.clone(), pair).is_some() {
                    return None;
                }
                Some(op_message("subscribe", &[topic]))
            }
            StreamCommand::Unsubscribe(pair) => {
                let topic = kline_topic(&pair);
                self.topics.remove(&topic)?;
                Some(op_message("unsubscribe", &[topic]))
            }
        }
    }

    async fn session<S>(&mut self, ws: tokio_tungstenite::WebSocketStream<S>) -> Disconnect
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
    {
        let (mut write, mut read) = ws.split();

        let topics: Vec<String> = self.topics.keys().cloned().collect();
        for chunk in topics.chunks(SUBSCRIBE_CHUNK) {
            if let Err(e) = write.send(op_message("subscribe", chunk)).await {
                error!("Failed to resubscribe: {}", e);
                return Disconnect::Lost;
            }
        }

        let mut heartbeat = tokio::time::interval(PING_INTERVAL);
        heartbeat.tick().await;

        loop {
            tokio::select! {
                message = read.next() => {
                    let message = match message {
                        Some(Ok(m)) => m,
                        Some(Err(e)) => {
                            error!("Market stream error: {}", e);
                            return Disconnect::Lost;
                        }
                        None => return Disconnect::Lost,
                    };
                    match message {
                        Message::Text(text) => {
                            for event in closed_candles(&text, &self.topics) {
                                if self.events.send(event).await.is_err() {
                                    return Disconnect::Shutdown;
                                }
                            }
                        }
                        Message::Ping(payload) => {
                            if write.send(Message::Pong(payload)).await.is_err() {
                                return Disconnect::Lost;
                            }
                        }
                        Message::Close(frame) => {
                            debug!("Market stream closed by server: {:?}", frame);
                            return Disconnect::Lost;
                        }
                        _ => {}
                    }
                }
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        let _ = write.send(Message::Close(None)).await;
                        return Disconnect::Shutdown;
                    };
                    if let Some(request) = self.apply_command(command) {
                        if let Err(e) = write.send(request).await {
                            error!("Failed to update stream topics: {}", e);
                            return Disconnect::Lost;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    let ping = Message::Text(r#"{"op":"ping"}"#.to_string());
                    if write.send(ping).await.is_err() {
                        return Disconnect::Lost;
                    }
                }
            }
        }
    }
}
