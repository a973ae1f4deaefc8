//! Ports to the outside world
//!
//! The engine never talks to the exchange, the database or the chat directly;
//! it is handed implementations of these traits at construction time.

use crate::config::Interval;
use crate::data::{Candle, Pair};
use crate::error::EngineError;
use crate::lifecycle::{MessageRef, Signal, SignalScope, SignalStatus, SignalUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Exchange market data.
///
/// Closed candles are not returned from here: the implementation pushes
/// [`MarketEvent`](crate::data::MarketEvent)s into the channel the engine
/// consumes.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Most recent closed candles, oldest first, never including the open one
    async fn fetch_historical_candles(
        &self,
        pair: &Pair,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError>;

    async fn subscribe(&self, pair: &Pair) -> Result<(), EngineError>;

    /// Unsubscribing a pair that is not subscribed is a no-op
    async fn unsubscribe(&self, pair: &Pair) -> Result<(), EngineError>;

    /// Symbols ordered by 24h volume, highest first
    async fn top_volume_symbols(&self, count: usize) -> Result<Vec<String>, EngineError>;
}

/// Active subscription as seen by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub interval: Interval,
    pub take_profit_override: Option<f64>,
    pub active: bool,
}

impl Subscription {
    pub fn pair(&self) -> Pair {
        Pair::new(&self.symbol, self.interval)
    }
}

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn list_active(&self) -> Result<Vec<Subscription>, EngineError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announce a new signal, returning the message to reply to later
    async fn notify(&self, scope: SignalScope, signal: &Signal) -> Result<MessageRef, EngineError>;

    /// Report a terminal transition, threaded under `reply_to` when known
    async fn reply(
        &self,
        scope: SignalScope,
        reply_to: Option<MessageRef>,
        update: &SignalUpdate,
    ) -> Result<(), EngineError>;
}

#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn save(&self, signal: &Signal) -> Result<(), EngineError>;

    /// Move an active signal to a terminal status.
    ///
    /// Returns `false` without touching the row when it is no longer active.
    async fn update_status(
        &self,
        id: Uuid,
        status: SignalStatus,
        exit_price: f64,
        pnl_percent: f64,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, EngineError>;

    async fn update_excursion(&self, id: Uuid, max_favorable_excursion: f64)
        -> Result<(), EngineError>;

    async fn set_message_ref(&self, id: Uuid, message_ref: MessageRef) -> Result<(), EngineError>;

    async fn mark_notified(&self, id: Uuid) -> Result<(), EngineError>;

    async fn find_active_by_scope(
        &self,
        pair: &Pair,
        scope: SignalScope,
    ) -> Result<Option<Signal>, EngineError>;

    async fn find_active_by_pair(&self, pair: &Pair) -> Result<Vec<Signal>, EngineError>;

    /// Delete terminal signals whose entry is older than `days`, returning the count
    async fn delete_older_than(&self, days: u32) -> Result<u64, EngineError>;
}
