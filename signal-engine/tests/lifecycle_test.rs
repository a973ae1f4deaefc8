//! Signal lifecycle tests against in-memory ports

mod common;

use chrono::Duration;
use common::*;
use signal_engine::prelude::*;
use std::sync::Arc;

struct Fixture {
    store: Arc<InMemorySignalStore>,
    notifier: Arc<RecordingNotifier>,
    lifecycle: Arc<SignalLifecycleManager>,
}

fn fixture() -> Fixture {
    let store = Arc::new(InMemorySignalStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let lifecycle = Arc::new(SignalLifecycleManager::new(store.clone(), notifier.clone()));
    Fixture {
        store,
        notifier,
        lifecycle,
    }
}

fn pair() -> Pair {
    Pair::new("BTCUSDT", Interval::M15)
}

fn short_candidate() -> SignalCandidate {
    SignalCandidate {
        side: Side::Short,
        entry_price: 110.0,
        pair: pair(),
        time: base_time(),
    }
}

fn candle(minutes_after_entry: i64, high: f64, low: f64, close: f64) -> Candle {
    // close time lands `minutes_after_entry` after the entry
    let start = base_time() + Duration::minutes(minutes_after_entry - 15);
    Candle::new(start, close, high, low, close, 1000.0, close * 1000.0)
}

fn now_for(candle: &Candle) -> chrono::DateTime<chrono::Utc> {
    candle.close_time(Interval::M15)
}

#[tokio::test]
async fn test_create_persists_and_notifies() {
    let f = fixture();
    let target = ScopeTarget::new(SignalScope::User(42));

    let signal = f.lifecycle.create(&short_candidate(), &target).await.unwrap();

    assert_eq!(signal.status, SignalStatus::Active);
    assert_eq!(signal.take_profit_percent, 1.5);
    assert_eq!(signal.validity_hours, 2);
    assert_eq!(f.notifier.notified_count(), 1);

    let stored = f.store.get(signal.id).unwrap();
    assert_eq!(stored.message_ref, Some(MessageRef(100)));
    assert!(!stored.notified);
}

#[tokio::test]
async fn test_second_candidate_rejected_while_active() {
    let f = fixture();
    let target = ScopeTarget::new(SignalScope::User(42));
    let first = f.lifecycle.create(&short_candidate(), &target).await.unwrap();

    let mut second = short_candidate();
    second.side = Side::Long;
    second.entry_price = 111.0;
    let result = f.lifecycle.create(&second, &target).await;

    assert!(matches!(result, Err(EngineError::InvariantViolation(_))));
    assert_eq!(f.store.all().len(), 1);
    assert_eq!(f.store.get(first.id).unwrap(), first);
    assert_eq!(f.notifier.notified_count(), 1);
}

#[tokio::test]
async fn test_scopes_are_independent() {
    let f = fixture();
    f.lifecycle
        .create(&short_candidate(), &ScopeTarget::new(SignalScope::User(1)))
        .await
        .unwrap();
    f.lifecycle
        .create(&short_candidate(), &ScopeTarget::new(SignalScope::Channel(-5)))
        .await
        .unwrap();

    assert_eq!(f.store.all().len(), 2);
    assert!(f.lifecycle.has_active(SignalScope::Channel(-5), &pair()).await.unwrap());
    assert!(!f.lifecycle.has_active(SignalScope::User(2), &pair()).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_creates_yield_one_signal() {
    let f = fixture();
    let target = ScopeTarget::new(SignalScope::User(42));
    let candidate = short_candidate();

    let (a, b) = tokio::join!(
        f.lifecycle.create(&candidate, &target),
        f.lifecycle.create(&candidate, &target)
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    assert_eq!(f.store.all().len(), 1);
    assert_eq!(f.notifier.notified_count(), 1);
}

#[tokio::test]
async fn test_excursion_only_grows() {
    let f = fixture();
    let signal = f
        .lifecycle
        .create(&short_candidate(), &ScopeTarget::new(SignalScope::User(42)))
        .await
        .unwrap();

    let deep = candle(15, 110.2, 109.0, 109.5);
    f.lifecycle.evaluate(&pair(), &deep, now_for(&deep)).await.unwrap();
    let mfe = f.store.get(signal.id).unwrap().max_favorable_excursion;
    assert!((mfe - 100.0 / 110.0).abs() < 1e-9);

    let shallow = candle(30, 110.5, 109.8, 110.1);
    f.lifecycle.evaluate(&pair(), &shallow, now_for(&shallow)).await.unwrap();
    assert_eq!(f.store.get(signal.id).unwrap().max_favorable_excursion, mfe);
    assert!(f.store.get(signal.id).unwrap().is_active());
}

#[tokio::test]
async fn test_take_profit_beats_expiry() {
    let f = fixture();
    let signal = f
        .lifecycle
        .create(&short_candidate(), &ScopeTarget::new(SignalScope::User(42)))
        .await
        .unwrap();

    // Expired and past take profit on the same candle
    let late = candle(120, 110.0, 108.0, 108.5);
    let updates = f.lifecycle.evaluate(&pair(), &late, now_for(&late)).await.unwrap();

    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, SignalStatus::Success);
    assert!((updates[0].pnl_percent - 200.0 / 110.0).abs() < 1e-9);
    assert_eq!(updates[0].exit_price, 108.5);

    let stored = f.store.get(signal.id).unwrap();
    assert_eq!(stored.status, SignalStatus::Success);
    assert!(stored.notified);
}

#[tokio::test]
async fn test_expiry_resolves_as_failure() {
    let f = fixture();
    let signal = f
        .lifecycle
        .create(&short_candidate(), &ScopeTarget::new(SignalScope::User(42)))
        .await
        .unwrap();

    let early = candle(105, 111.0, 109.6, 110.8);
    assert!(f.lifecycle.evaluate(&pair(), &early, now_for(&early)).await.unwrap().is_empty());

    let expiry = candle(120, 111.5, 109.9, 111.1);
    let updates = f.lifecycle.evaluate(&pair(), &expiry, now_for(&expiry)).await.unwrap();

    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, SignalStatus::Failure);
    assert!((updates[0].pnl_percent + 1.1 / 110.0 * 100.0).abs() < 1e-9);
    assert_eq!(f.store.get(signal.id).unwrap().status, SignalStatus::Failure);

    let replies = f.notifier.replies.lock().unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].1, Some(MessageRef(100)));
}

#[tokio::test]
async fn test_terminal_signal_is_left_alone() {
    let f = fixture();
    let signal = f
        .lifecycle
        .create(&short_candidate(), &ScopeTarget::new(SignalScope::User(42)))
        .await
        .unwrap();

    let hit = candle(45, 110.0, 108.0, 108.2);
    f.lifecycle.evaluate(&pair(), &hit, now_for(&hit)).await.unwrap();
    let resolved = f.store.get(signal.id).unwrap();

    for minutes in [60, 120, 240] {
        let later = candle(minutes, 112.0, 100.0, 101.0);
        let updates = f.lifecycle.evaluate(&pair(), &later, now_for(&later)).await.unwrap();
        assert!(updates.is_empty());
    }

    assert_eq!(f.store.get(signal.id).unwrap(), resolved);
    assert_eq!(f.notifier.reply_count(), 1);
}

#[tokio::test]
async fn test_take_profit_override_applies() {
    let f = fixture();
    let target = ScopeTarget::with_take_profit(SignalScope::User(42), Some(3.0));
    let signal = f.lifecycle.create(&short_candidate(), &target).await.unwrap();
    assert_eq!(signal.take_profit_percent, 3.0);

    // 1.8% is enough for the interval default but not for the override
    let hit = candle(45, 110.0, 108.0, 108.2);
    assert!(f.lifecycle.evaluate(&pair(), &hit, now_for(&hit)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cleanup_keeps_active_signals() {
    let f = fixture();
    let mut old_active = Signal::open(&short_candidate(), &ScopeTarget::new(SignalScope::User(1)));
    old_active.entry_time = chrono::Utc::now() - Duration::days(90);
    let mut old_done = old_active.clone();
    old_done.id = uuid::Uuid::new_v4();
    old_done.status = SignalStatus::Failure;
    let mut recent_done = old_done.clone();
    recent_done.id = uuid::Uuid::new_v4();
    recent_done.entry_time = chrono::Utc::now() - Duration::days(2);

    f.store.insert(old_active.clone());
    f.store.insert(old_done);
    f.store.insert(recent_done.clone());

    assert_eq!(f.lifecycle.cleanup(30).await.unwrap(), 1);
    let left: Vec<_> = f.store.all().into_iter().map(|s| s.id).collect();
    assert_eq!(left, vec![old_active.id, recent_done.id]);
}

#[tokio::test]
async fn test_failed_announcement_keeps_signal_active() {
    let f = fixture();
    f.notifier.fail_notify(true);

    let signal = f
        .lifecycle
        .create(&short_candidate(), &ScopeTarget::new(SignalScope::User(42)))
        .await
        .unwrap();

    let stored = f.store.get(signal.id).unwrap();
    assert_eq!(stored.status, SignalStatus::Active);
    assert_eq!(stored.message_ref, None);
    assert_eq!(f.notifier.notified_count(), 0);

    // resolution still reports, just without a message to reply to
    let hit = candle(30, 110.0, 108.0, 108.5);
    let updates = f.lifecycle.evaluate(&pair(), &hit, now_for(&hit)).await.unwrap();
    assert_eq!(updates.len(), 1);
    let replies = f.notifier.replies.lock().unwrap();
    assert_eq!(replies[0].1, None);
}

#[tokio::test]
async fn test_failed_reply_leaves_signal_unnotified() {
    let f = fixture();
    let signal = f
        .lifecycle
        .create(&short_candidate(), &ScopeTarget::new(SignalScope::User(42)))
        .await
        .unwrap();
    f.notifier.fail_reply(true);

    let hit = candle(30, 110.0, 108.0, 108.5);
    let updates = f.lifecycle.evaluate(&pair(), &hit, now_for(&hit)).await.unwrap();
    assert_eq!(updates.len(), 1);

    let stored = f.store.get(signal.id).unwrap();
    assert_eq!(stored.status, SignalStatus::Success);
    assert!(!stored.notified);
    assert_eq!(f.notifier.reply_count(), 0);
}

#[tokio::test]
async fn test_failed_status_write_retries_on_next_candle() {
    let f = fixture();
    let signal = f
        .lifecycle
        .create(&short_candidate(), &ScopeTarget::new(SignalScope::User(42)))
        .await
        .unwrap();
    f.store.fail_status_updates(true);

    let hit = candle(30, 110.0, 108.0, 108.5);
    let updates = f.lifecycle.evaluate(&pair(), &hit, now_for(&hit)).await.unwrap();
    assert!(updates.is_empty());
    assert_eq!(f.store.get(signal.id).unwrap().status, SignalStatus::Active);
    assert_eq!(f.notifier.reply_count(), 0);

    f.store.fail_status_updates(false);
    let next = candle(45, 109.2, 108.9, 109.0);
    let updates = f.lifecycle.evaluate(&pair(), &next, now_for(&next)).await.unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, SignalStatus::Success);
    assert_eq!(updates[0].exit_price, 109.0);

    let stored = f.store.get(signal.id).unwrap();
    assert_eq!(stored.status, SignalStatus::Success);
    assert!(stored.notified);
}

#[tokio::test]
async fn test_resolved_scope_releases_its_lock() {
    let f = fixture();
    f.lifecycle
        .create(&short_candidate(), &ScopeTarget::new(SignalScope::User(42)))
        .await
        .unwrap();
    assert_eq!(f.lifecycle.lock_count().await, 1);

    let quiet = candle(15, 110.1, 109.9, 110.0);
    f.lifecycle.evaluate(&pair(), &quiet, now_for(&quiet)).await.unwrap();
    assert_eq!(f.lifecycle.lock_count().await, 1);

    let hit = candle(30, 110.0, 108.0, 108.5);
    f.lifecycle.evaluate(&pair(), &hit, now_for(&hit)).await.unwrap();
    assert_eq!(f.lifecycle.lock_count().await, 0);
}
