//! Coordinator loop tying market events, reconciliation and housekeeping together

use crate::config::EngineSettings;
use crate::data::{MarketEvent, Pair};
use crate::error::EngineError;
use crate::lifecycle::{ScopeTarget, SignalLifecycleManager, SignalScope};
use crate::ports::{MarketDataSource, Notifier, SignalStore, Subscription, SubscriptionStore};
use crate::strategy::SignalGenerator;
use crate::stream::PairStreamManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

const CLEANUP_EVERY: Duration = Duration::from_secs(24 * 60 * 60);

/// Requests from the chat front end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCommand {
    /// A subscription was created, changed or removed
    SubscriptionsChanged,
    Shutdown,
}

/// Desired pairs with the scopes interested in each.
///
/// Every active subscription adds its user scope; with a broadcast channel,
/// each top-volume symbol adds the channel scope on every broadcast interval.
pub fn desired_targets(
    subscriptions: &[Subscription],
    broadcast: Option<(i64, &[String])>,
    broadcast_intervals: &[crate::config::Interval],
) -> HashMap<Pair, Vec<ScopeTarget>> {
    let mut desired: HashMap<Pair, Vec<ScopeTarget>> = HashMap::new();

    let mut push = |pair: Pair, target: ScopeTarget| {
        let targets = desired.entry(pair).or_default();
        if !targets.iter().any(|t| t.scope == target.scope) {
            targets.push(target);
        }
    };

    for sub in subscriptions.iter().filter(|s| s.active) {
        push(
            sub.pair(),
            ScopeTarget::with_take_profit(SignalScope::User(sub.user_id), sub.take_profit_override),
        );
    }

    if let Some((channel_id, symbols)) = broadcast {
        for symbol in symbols {
            for &interval in broadcast_intervals {
                push(
                    Pair::new(symbol, interval),
                    ScopeTarget::new(SignalScope::Channel(channel_id)),
                );
            }
        }
    }

    desired
}

pub struct SignalService {
    settings: Arc<EngineSettings>,
    source: Arc<dyn MarketDataSource>,
    subscriptions: Arc<dyn SubscriptionStore>,
    lifecycle: Arc<SignalLifecycleManager>,
    streams: PairStreamManager,
    top_symbols: Vec<String>,
}

impl SignalService {
    pub fn new(
        settings: EngineSettings,
        source: Arc<dyn MarketDataSource>,
        subscriptions: Arc<dyn SubscriptionStore>,
        signals: Arc<dyn SignalStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let settings = Arc::new(settings);
        let lifecycle = Arc::new(SignalLifecycleManager::new(signals, notifier));
        let generator = Arc::new(SignalGenerator::new(settings.clone(), source.clone()));
        let streams = PairStreamManager::new(
            settings.clone(),
            source.clone(),
            generator,
            lifecycle.clone(),
        );

        Self {
            settings,
            source,
            subscriptions,
            lifecycle,
            streams,
            top_symbols: Vec::new(),
        }
    }

    pub fn streams(&self) -> &PairStreamManager {
        &self.streams
    }

    pub fn lifecycle(&self) -> Arc<SignalLifecycleManager> {
        self.lifecycle.clone()
    }

    /// Process events until the market stream closes or shutdown is requested
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<MarketEvent>,
        mut control: mpsc::Receiver<ServiceCommand>,
    ) {
        info!("Signal service starting");
        self.refresh_top_volume().await;
        self.reconcile().await;

        let reconcile_every = self.settings.reconcile_every();
        let refresh_every = self.settings.top_volume_refresh_every();
        let mut reconcile_tick = interval_at(Instant::now() + reconcile_every, reconcile_every);
        let mut refresh_tick = interval_at(Instant::now() + refresh_every, refresh_every);
        let mut cleanup_tick = tokio::time::interval(CLEANUP_EVERY);
        reconcile_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        refresh_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.streams.handle_event(event).await,
                    None => {
                        info!("Market event stream closed");
                        break;
                    }
                },
                Some(command) = control.recv() => match command {
                    ServiceCommand::SubscriptionsChanged => self.reconcile().await,
                    ServiceCommand::Shutdown => {
                        info!("Shutdown requested");
                        break;
                    }
                },
                Some(result) = self.streams.next_warmup() => {
                    self.streams.handle_warmup(result).await;
                }
                _ = reconcile_tick.tick() => self.reconcile().await,
                _ = refresh_tick.tick() => {
                    self.refresh_top_volume().await;
                    self.reconcile().await;
                }
                _ = cleanup_tick.tick() => self.cleanup().await,
            }
        }

        self.streams.shutdown().await;
        info!("Signal service stopped");
    }

    /// Recompute the desired pairs from a fresh subscription snapshot
    pub async fn reconcile(&mut self) {
        let subscriptions = match self.subscriptions.list_active().await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                warn!("Failed to load subscriptions, keeping current streams: {}", e);
                return;
            }
        };

        let broadcast = self
            .settings
            .broadcast_channel_id
            .map(|id| (id, self.top_symbols.as_slice()));
        let desired = desired_targets(
            &subscriptions,
            broadcast,
            &self.settings.broadcast_intervals,
        );
        self.streams.reconcile(desired).await;
    }

    /// Refresh the top-volume symbols that feed the broadcast channel
    pub async fn refresh_top_volume(&mut self) {
        if self.settings.broadcast_channel_id.is_none() {
            return;
        }
        match self.fetch_top_symbols().await {
            Ok(symbols) => {
                info!("Top volume symbols: {}", symbols.join(", "));
                self.top_symbols = symbols;
            }
            Err(e) => warn!("Failed to refresh top volume symbols: {}", e),
        }
    }

    async fn fetch_top_symbols(&self) -> Result<Vec<String>, EngineError> {
        self.source
            .top_volume_symbols(self.settings.top_volume_count)
            .await
    }

    async fn cleanup(&self) {
        if let Err(e) = self.lifecycle.cleanup(self.settings.retention_days).await {
            warn!("Signal cleanup failed: {}", e);
        }
    }
}
