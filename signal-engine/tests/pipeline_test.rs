//! End-to-end signal pipeline: warm-up, live candles, signal creation and resolution

mod common;

use chrono::{DateTime, Duration, Utc};
use common::*;
use signal_engine::indicators::macd;
use signal_engine::prelude::*;
use std::sync::Arc;
use tokio::sync::mpsc;

/// 40 closes on 15m: flat, a ten candle climb, then flat again.
///
/// The histogram peaks at candle 30 and fades while staying positive
/// through candle 39. Candle 35 carries a volume spike and candle 38
/// dips to 108.
fn scenario() -> Vec<Candle> {
    let closes: Vec<f64> = (1..=40)
        .map(|i| match i {
            1..=20 => 100.0,
            21..=30 => 100.0 + (i - 20) as f64,
            _ => 110.0,
        })
        .collect();

    let mut candles = candles_from_closes(Interval::M15, base_time(), &closes, 1000.0);
    candles[34].volume = 2500.0;
    candles[37].low = 108.0;
    candles
}

fn bearish_htf() -> Vec<Candle> {
    let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
    candles_from_closes(Interval::M30, base_time() - Duration::days(1), &closes, 500.0)
}

/// Accelerating climb: the 30m histogram is positive and still growing
fn bullish_htf() -> Vec<Candle> {
    let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i * i) as f64 / 20.0).collect();
    let series = macd(&closes, 12, 26, 9).unwrap();
    let (previous, latest) = (
        series.previous_histogram().unwrap(),
        series.latest_histogram().unwrap(),
    );
    assert!(previous > 0.0 && latest > previous, "fixture histogram must be rising");
    candles_from_closes(Interval::M30, base_time() - Duration::days(1), &closes, 500.0)
}

fn close_of(candle_number: usize) -> DateTime<Utc> {
    base_time() + Duration::minutes(15 * candle_number as i64)
}

struct Run {
    source: Arc<FakeMarketData>,
    store: Arc<InMemorySignalStore>,
    notifier: Arc<RecordingNotifier>,
}

/// Seed candles 1-20 as history, stream 21-40 live, run the service to completion
async fn run_scenario(
    settings: EngineSettings,
    subscriptions: Vec<Subscription>,
    htf: Vec<Candle>,
    top_symbols: &[&str],
) -> Run {
    init_tracing();
    let pair = Pair::new("BTCUSDT", Interval::M15);
    let candles = scenario();

    let source = Arc::new(FakeMarketData::new());
    source.set_history(pair.clone(), candles[..20].to_vec());
    source.set_history(pair.with_interval(Interval::M30), htf);
    source.set_top_symbols(top_symbols);
    let store = Arc::new(InMemorySignalStore::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let service = SignalService::new(
        settings,
        source.clone(),
        Arc::new(FakeSubscriptions::new(subscriptions)),
        store.clone(),
        notifier.clone(),
    );

    let (events_tx, events_rx) = mpsc::channel(64);
    let (_control_tx, control_rx) = mpsc::channel(4);
    for candle in candles[20..].iter().cloned() {
        events_tx
            .send(MarketEvent::ClosedCandle {
                pair: pair.clone(),
                candle,
            })
            .await
            .unwrap();
    }
    drop(events_tx);

    service.run(events_rx, control_rx).await;

    Run {
        source,
        store,
        notifier,
    }
}

#[tokio::test]
async fn test_short_signal_created_and_resolved() {
    let run = run_scenario(
        EngineSettings::default(),
        vec![subscription(1, 42, "BTCUSDT", Interval::M15)],
        bearish_htf(),
        &[],
    )
    .await;

    let signals = run.store.all();
    assert_eq!(signals.len(), 1);
    let signal = &signals[0];
    assert_eq!(signal.scope, SignalScope::User(42));
    assert_eq!(signal.side, Side::Short);
    assert_eq!(signal.entry_price, 110.0);
    assert_eq!(signal.entry_time, close_of(35));
    assert_eq!(signal.take_profit_percent, 1.5);

    assert_eq!(signal.status, SignalStatus::Success);
    assert_eq!(signal.closed_at, Some(close_of(38)));
    assert_eq!(signal.exit_price, Some(110.0));
    assert!((signal.pnl_percent.unwrap() - 200.0 / 110.0).abs() < 1e-9);
    assert!(signal.notified);

    assert_eq!(run.notifier.notified_count(), 1);
    assert_eq!(run.notifier.reply_count(), 1);

    let htf_pair = Pair::new("BTCUSDT", Interval::M30);
    assert_eq!(run.source.fetches_for(&htf_pair), 1);
}

#[tokio::test]
async fn test_bullish_higher_timeframe_blocks_short() {
    let run = run_scenario(
        EngineSettings::default(),
        vec![subscription(1, 42, "BTCUSDT", Interval::M15)],
        bullish_htf(),
        &[],
    )
    .await;

    assert!(run.store.all().is_empty());
    assert_eq!(run.notifier.notified_count(), 0);
}

#[tokio::test]
async fn test_missing_higher_timeframe_history_blocks_signal() {
    let run = run_scenario(
        EngineSettings::default(),
        vec![subscription(1, 42, "BTCUSDT", Interval::M15)],
        Vec::new(),
        &[],
    )
    .await;

    assert!(run.store.all().is_empty());
}

#[tokio::test]
async fn test_broadcast_and_subscriber_scopes_get_own_signals() {
    let settings = EngineSettings {
        broadcast_channel_id: Some(-1001),
        ..EngineSettings::default()
    };
    let mut sub = subscription(1, 42, "BTCUSDT", Interval::M15);
    sub.take_profit_override = Some(2.5);

    let run = run_scenario(settings, vec![sub], bearish_htf(), &["BTCUSDT"]).await;

    let mut signals = run.store.all();
    signals.sort_by_key(|s| s.scope);
    assert_eq!(signals.len(), 2);

    let channel = &signals[0];
    assert_eq!(channel.scope, SignalScope::Channel(-1001));
    assert_eq!(channel.status, SignalStatus::Success);

    // 1.82% never reaches the 2.5% override, and the window ends inside validity
    let user = &signals[1];
    assert_eq!(user.scope, SignalScope::User(42));
    assert_eq!(user.take_profit_percent, 2.5);
    assert_eq!(user.status, SignalStatus::Active);

    assert!(run.source.calls().contains(&SourceCall::TopVolume(10)));
    assert_eq!(run.source.fetches_for(&Pair::new("BTCUSDT", Interval::M30)), 1);
}

#[tokio::test]
async fn test_no_subscriptions_means_no_streams() {
    let run = run_scenario(EngineSettings::default(), Vec::new(), bearish_htf(), &[]).await;

    assert!(run.source.calls().is_empty());
    assert!(run.store.all().is_empty());
}
