//! In-memory implementations of the engine ports that record every call

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use signal_engine::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Call made against [`FakeMarketData`]
#[derive(Debug, Clone, PartialEq)]
pub enum SourceCall {
    Fetch(Pair, usize),
    Subscribe(Pair),
    Unsubscribe(Pair),
    TopVolume(usize),
}

#[derive(Default)]
pub struct FakeMarketData {
    history: Mutex<HashMap<Pair, Vec<Candle>>>,
    failing: Mutex<HashSet<Pair>>,
    top_symbols: Mutex<Vec<String>>,
    calls: Mutex<Vec<SourceCall>>,
}

impl FakeMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_history(&self, pair: Pair, candles: Vec<Candle>) {
        self.history.lock().unwrap().insert(pair, candles);
    }

    pub fn fail_fetch(&self, pair: Pair) {
        self.failing.lock().unwrap().insert(pair);
    }

    pub fn set_top_symbols(&self, symbols: &[&str]) {
        *self.top_symbols.lock().unwrap() = symbols.iter().map(|s| s.to_string()).collect();
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fetches_for(&self, pair: &Pair) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, SourceCall::Fetch(p, _) if p == pair))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl MarketDataSource for FakeMarketData {
    async fn fetch_historical_candles(
        &self,
        pair: &Pair,
        limit: usize,
    ) -> Result<Vec<Candle>, EngineError> {
        self.calls
            .lock()
            .unwrap()
            .push(SourceCall::Fetch(pair.clone(), limit));
        if self.failing.lock().unwrap().contains(pair) {
            return Err(EngineError::Network(anyhow::anyhow!("fetch refused for {}", pair)));
        }
        let history = self
            .history
            .lock()
            .unwrap()
            .get(pair)
            .cloned()
            .unwrap_or_default();
        let skip = history.len().saturating_sub(limit);
        Ok(history.into_iter().skip(skip).collect())
    }

    async fn subscribe(&self, pair: &Pair) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(SourceCall::Subscribe(pair.clone()));
        Ok(())
    }

    async fn unsubscribe(&self, pair: &Pair) -> Result<(), EngineError> {
        self.calls.lock().unwrap().push(SourceCall::Unsubscribe(pair.clone()));
        Ok(())
    }

    async fn top_volume_symbols(&self, count: usize) -> Result<Vec<String>, EngineError> {
        self.calls.lock().unwrap().push(SourceCall::TopVolume(count));
        Ok(self
            .top_symbols
            .lock()
            .unwrap()
            .iter()
            .take(count)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FakeSubscriptions {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl FakeSubscriptions {
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        Self {
            subscriptions: Mutex::new(subscriptions),
        }
    }
}

#[async_trait]
impl SubscriptionStore for FakeSubscriptions {
    async fn list_active(&self) -> Result<Vec<Subscription>, EngineError> {
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.active)
            .cloned()
            .collect())
    }
}

pub struct RecordingNotifier {
    next_ref: AtomicI32,
    fail_notify: AtomicBool,
    fail_reply: AtomicBool,
    pub notified: Mutex<Vec<(SignalScope, Signal)>>,
    pub replies: Mutex<Vec<(SignalScope, Option<MessageRef>, SignalUpdate)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            next_ref: AtomicI32::new(100),
            fail_notify: AtomicBool::new(false),
            fail_reply: AtomicBool::new(false),
            notified: Mutex::new(Vec::new()),
            replies: Mutex::new(Vec::new()),
        }
    }

    /// Make every `notify` call fail until reset
    pub fn fail_notify(&self, fail: bool) {
        self.fail_notify.store(fail, Ordering::SeqCst);
    }

    pub fn fail_reply(&self, fail: bool) {
        self.fail_reply.store(fail, Ordering::SeqCst);
    }

    pub fn notified_count(&self) -> usize {
        self.notified.lock().unwrap().len()
    }

    pub fn reply_count(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, scope: SignalScope, signal: &Signal) -> Result<MessageRef, EngineError> {
        if self.fail_notify.load(Ordering::SeqCst) {
            return Err(EngineError::Notification(anyhow::anyhow!("chat unreachable")));
        }
        self.notified.lock().unwrap().push((scope, signal.clone()));
        Ok(MessageRef(self.next_ref.fetch_add(1, Ordering::SeqCst)))
    }

    async fn reply(
        &self,
        scope: SignalScope,
        reply_to: Option<MessageRef>,
        update: &SignalUpdate,
    ) -> Result<(), EngineError> {
        if self.fail_reply.load(Ordering::SeqCst) {
            return Err(EngineError::Notification(anyhow::anyhow!("chat unreachable")));
        }
        self.replies
            .lock()
            .unwrap()
            .push((scope, reply_to, update.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemorySignalStore {
    signals: Mutex<Vec<Signal>>,
    fail_status_updates: AtomicBool,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Signal> {
        self.signals.lock().unwrap().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<Signal> {
        self.all().into_iter().find(|s| s.id == id)
    }

    /// Make `update_status` fail until reset
    pub fn fail_status_updates(&self, fail: bool) {
        self.fail_status_updates.store(fail, Ordering::SeqCst);
    }

    pub fn insert(&self, signal: Signal) {
        self.signals.lock().unwrap().push(signal);
    }

    fn modify<F: FnOnce(&mut Signal)>(&self, id: Uuid, f: F) -> Result<(), EngineError> {
        let mut signals = self.signals.lock().unwrap();
        match signals.iter_mut().find(|s| s.id == id) {
            Some(signal) => {
                f(signal);
                Ok(())
            }
            None => Err(EngineError::Persistence(anyhow::anyhow!("signal {} not found", id))),
        }
    }
}

#[async_trait]
impl SignalStore for InMemorySignalStore {
    async fn save(&self, signal: &Signal) -> Result<(), EngineError> {
        self.insert(signal.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: SignalStatus,
        exit_price: f64,
        pnl_percent: f64,
        closed_at: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        if self.fail_status_updates.load(Ordering::SeqCst) {
            return Err(EngineError::Persistence(anyhow::anyhow!("database unavailable")));
        }
        let mut signals = self.signals.lock().unwrap();
        match signals.iter_mut().find(|s| s.id == id && s.is_active()) {
            Some(signal) => {
                signal.status = status;
                signal.exit_price = Some(exit_price);
                signal.pnl_percent = Some(pnl_percent);
                signal.closed_at = Some(closed_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_excursion(&self, id: Uuid, mfe: f64) -> Result<(), EngineError> {
        self.modify(id, |s| s.max_favorable_excursion = mfe)
    }

    async fn set_message_ref(&self, id: Uuid, message_ref: MessageRef) -> Result<(), EngineError> {
        self.modify(id, |s| s.message_ref = Some(message_ref))
    }

    async fn mark_notified(&self, id: Uuid) -> Result<(), EngineError> {
        self.modify(id, |s| s.notified = true)
    }

    async fn find_active_by_scope(
        &self,
        pair: &Pair,
        scope: SignalScope,
    ) -> Result<Option<Signal>, EngineError> {
        Ok(self
            .all()
            .into_iter()
            .find(|s| s.is_active() && &s.pair == pair && s.scope == scope))
    }

    async fn find_active_by_pair(&self, pair: &Pair) -> Result<Vec<Signal>, EngineError> {
        Ok(self
            .all()
            .into_iter()
            .filter(|s| s.is_active() && &s.pair == pair)
            .collect())
    }

    async fn delete_older_than(&self, days: u32) -> Result<u64, EngineError> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let mut signals = self.signals.lock().unwrap();
        let before = signals.len();
        signals.retain(|s| s.is_active() || s.entry_time >= cutoff);
        Ok((before - signals.len()) as u64)
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0).unwrap()
}

/// Candles with the given closes, high/low at close +/- 0.2
pub fn candles_from_closes(
    interval: Interval,
    start: DateTime<Utc>,
    closes: &[f64],
    volume: f64,
) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            Candle::new(
                start + interval.duration() * i as i32,
                close,
                close + 0.2,
                close - 0.2,
                close,
                volume,
                close * volume,
            )
        })
        .collect()
}

pub fn subscription(id: i64, user_id: i64, symbol: &str, interval: Interval) -> Subscription {
    Subscription {
        id,
        user_id,
        symbol: symbol.to_string(),
        interval,
        take_profit_override: None,
        active: true,
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
