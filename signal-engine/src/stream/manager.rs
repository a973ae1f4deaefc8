//! Reconciliation of the desired pair set against live subscriptions

use crate::config::EngineSettings;
use crate::data::{Candle, MarketEvent, Pair};
use crate::error::EngineError;
use crate::lifecycle::{ScopeTarget, SignalLifecycleManager};
use crate::ports::MarketDataSource;
use crate::strategy::{PairState, SignalGenerator};
use crate::stream::{PairCommand, PairHandle, PairWorker};
use anyhow::anyhow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Why a history fetch was started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupKind {
    /// First seeding of a newly added pair
    Initial,
    /// Re-seeding a running pair after a stream restart
    Reseed,
}

/// Outcome of a history fetch, delivered back to the manager
#[derive(Debug)]
pub struct WarmupResult {
    pub pair: Pair,
    pub kind: WarmupKind,
    generation: u64,
    pub outcome: Result<Vec<Candle>, EngineError>,
}

/// Subscribed pair still waiting for its history
struct PendingPair {
    generation: u64,
    targets: Vec<ScopeTarget>,
    buffer: Vec<Candle>,
    task: JoinHandle<()>,
}

struct RunningPair {
    handle: PairHandle,
    targets: Vec<ScopeTarget>,
}

/// Owns every pair worker and in-flight warm-up.
///
/// A pair counts as subscribed from the moment the live stream is
/// subscribed: candles that arrive while its history is loading are
/// buffered and replayed once the window is seeded.
pub struct PairStreamManager {
    settings: Arc<EngineSettings>,
    source: Arc<dyn MarketDataSource>,
    generator: Arc<SignalGenerator>,
    lifecycle: Arc<SignalLifecycleManager>,
    workers: HashMap<Pair, RunningPair>,
    pending: HashMap<Pair, PendingPair>,
    reseeding: HashMap<Pair, (u64, JoinHandle<()>)>,
    warmup_tx: mpsc::Sender<WarmupResult>,
    warmup_rx: mpsc::Receiver<WarmupResult>,
    next_generation: u64,
}

impl PairStreamManager {
    pub fn new(
        settings: Arc<EngineSettings>,
        source: Arc<dyn MarketDataSource>,
        generator: Arc<SignalGenerator>,
        lifecycle: Arc<SignalLifecycleManager>,
    ) -> Self {
        let (warmup_tx, warmup_rx) = mpsc::channel(64);
        Self {
            settings,
            source,
            generator,
            lifecycle,
            workers: HashMap::new(),
            pending: HashMap::new(),
            reseeding: HashMap::new(),
            warmup_tx,
            warmup_rx,
            next_generation: 0,
        }
    }

    /// Pairs with a running worker or an in-flight warm-up
    pub fn subscribed(&self) -> HashSet<Pair> {
        self.workers.keys().chain(self.pending.keys()).cloned().collect()
    }

    pub fn running(&self) -> HashSet<Pair> {
        self.workers.keys().cloned().collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Bring subscriptions in line with `desired`.
    ///
    /// Pairs in both sets only get their scope targets refreshed.
    pub async fn reconcile(&mut self, desired: HashMap<Pair, Vec<ScopeTarget>>) {
        let subscribed = self.subscribed();
        let to_remove: Vec<Pair> = subscribed
            .iter()
            .filter(|p| !desired.contains_key(*p))
            .cloned()
            .collect();

        for pair in &to_remove {
            self.remove_pair(pair).await;
        }

        let mut added = 0;
        for (pair, targets) in desired {
            if subscribed.contains(&pair) {
                self.update_targets(&pair, targets).await;
            } else {
                self.add_pair(pair, targets).await;
                added += 1;
            }
        }

        if added > 0 || !to_remove.is_empty() {
            info!(
                "Reconciled streams: {} added, {} removed, {} subscribed",
                added,
                to_remove.len(),
                self.workers.len() + self.pending.len()
            );
        }
    }

    async fn update_targets(&mut self, pair: &Pair, targets: Vec<ScopeTarget>) {
        if let Some(pending) = self.pending.get_mut(pair) {
            pending.targets = targets;
            return;
        }
        if let Some(running) = self.workers.get_mut(pair) {
            if running.targets == targets {
                return;
            }
            running.targets = targets.clone();
            if running.handle.tx.send(PairCommand::Targets(targets)).await.is_err() {
                warn!("Worker for {} is gone", pair);
            }
        }
    }

    async fn add_pair(&mut self, pair: Pair, targets: Vec<ScopeTarget>) {
        if let Err(e) = self.source.subscribe(&pair).await {
            warn!("Failed to subscribe {}, retrying on next pass: {}", pair, e);
            return;
        }

        let (generation, task) = self.spawn_warmup(pair.clone(), WarmupKind::Initial);
        self.pending.insert(
            pair.clone(),
            PendingPair {
                generation,
                targets,
                buffer: Vec::new(),
                task,
            },
        );
        debug!("Subscribed {}, warming up", pair);
    }

    fn spawn_warmup(&mut self, pair: Pair, kind: WarmupKind) -> (u64, JoinHandle<()>) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let source = self.source.clone();
        let tx = self.warmup_tx.clone();
        let limit = self.settings.history_candles;
        let timeout = self.settings.warmup_timeout();

        let task = tokio::spawn(async move {
            let outcome =
                match tokio::time::timeout(timeout, source.fetch_historical_candles(&pair, limit))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(EngineError::Network(anyhow!(
                        "history fetch for {} timed out after {:?}",
                        pair,
                        timeout
                    ))),
                };
            let _ = tx
                .send(WarmupResult {
                    pair,
                    kind,
                    generation,
                    outcome,
                })
                .await;
        });

        (generation, task)
    }

    async fn remove_pair(&mut self, pair: &Pair) {
        if let Some(pending) = self.pending.remove(pair) {
            pending.task.abort();
        }
        if let Some((_, task)) = self.reseeding.remove(pair) {
            task.abort();
        }
        // Dropping the sender lets the worker finish its queue and exit
        self.workers.remove(pair);

        if let Err(e) = self.source.unsubscribe(pair).await {
            warn!("Failed to unsubscribe {}: {}", pair, e);
        }
        debug!("Removed {}", pair);
    }

    /// Route one market event to its pair
    pub async fn handle_event(&mut self, event: MarketEvent) {
        match event {
            MarketEvent::ClosedCandle { pair, candle } => {
                if let Some(running) = self.workers.get(&pair) {
                    if running.handle.tx.send(PairCommand::Candle(candle)).await.is_err() {
                        warn!("Worker for {} is gone, dropping candle", pair);
                    }
                } else if let Some(pending) = self.pending.get_mut(&pair) {
                    pending.buffer.push(candle);
                } else {
                    debug!("Candle for untracked pair {}", pair);
                }
            }
            MarketEvent::StreamRestarted => self.rewarm_all(),
        }
    }

    /// Wait for the next finished history fetch
    pub async fn next_warmup(&mut self) -> Option<WarmupResult> {
        self.warmup_rx.recv().await
    }

    /// Apply a finished history fetch; results for removed pairs are dropped
    pub async fn handle_warmup(&mut self, result: WarmupResult) {
        match result.kind {
            WarmupKind::Initial => self.finish_initial(result).await,
            WarmupKind::Reseed => self.finish_reseed(result).await,
        }
    }

    async fn finish_initial(&mut self, result: WarmupResult) {
        let is_current = self
            .pending
            .get(&result.pair)
            .map(|p| p.generation == result.generation)
            .unwrap_or(false);
        if !is_current {
            debug!("Dropping late warm-up for {}", result.pair);
            return;
        }
        let pending = match self.pending.remove(&result.pair) {
            Some(pending) => pending,
            None => return,
        };
        let pair = result.pair;

        let history = match result.outcome {
            Ok(history) => history,
            Err(e) => {
                warn!("Warm-up failed for {}, retrying on next pass: {}", pair, e);
                if let Err(e) = self.source.unsubscribe(&pair).await {
                    warn!("Failed to unsubscribe {}: {}", pair, e);
                }
                return;
            }
        };

        let mut state = PairState::new(
            pair.clone(),
            self.settings.indicator_params(),
            self.settings.window_capacity,
        );
        state.seed(history);
        let seeded_until = state.last_start_time();

        let worker = PairWorker::new(
            state,
            pending.targets.clone(),
            self.generator.clone(),
            self.lifecycle.clone(),
        );
        let handle = worker.spawn(self.settings.worker_queue);

        let replay: Vec<Candle> = pending
            .buffer
            .into_iter()
            .filter(|c| seeded_until.map(|t| c.start_time > t).unwrap_or(true))
            .collect();
        info!("Warmed up {} ({} buffered candles to replay)", pair, replay.len());
        for candle in replay {
            if handle.tx.send(PairCommand::Candle(candle)).await.is_err() {
                warn!("Worker for {} exited during replay", pair);
                break;
            }
        }

        self.workers.insert(
            pair,
            RunningPair {
                handle,
                targets: pending.targets,
            },
        );
    }

    async fn finish_reseed(&mut self, result: WarmupResult) {
        let is_current = self
            .reseeding
            .get(&result.pair)
            .map(|(generation, _)| *generation == result.generation)
            .unwrap_or(false);
        if !is_current {
            return;
        }
        self.reseeding.remove(&result.pair);

        match (result.outcome, self.workers.get(&result.pair)) {
            (Ok(history), Some(running)) => {
                info!("Re-seeding {} with {} candles", result.pair, history.len());
                if running.handle.tx.send(PairCommand::Reseed(history)).await.is_err() {
                    warn!("Worker for {} is gone", result.pair);
                }
            }
            (Err(e), _) => warn!("Re-seed failed for {}: {}", result.pair, e),
            (Ok(_), None) => {}
        }
    }

    /// Re-fetch history for every running pair after the stream restarted
    pub fn rewarm_all(&mut self) {
        let pairs: Vec<Pair> = self.workers.keys().cloned().collect();
        if pairs.is_empty() {
            return;
        }
        info!("Market stream restarted, re-seeding {} pairs", pairs.len());
        for pair in pairs {
            if let Some((_, task)) = self.reseeding.remove(&pair) {
                task.abort();
            }
            let (generation, task) = self.spawn_warmup(pair.clone(), WarmupKind::Reseed);
            self.reseeding.insert(pair, (generation, task));
        }
    }

    /// Apply warm-ups until none is in flight
    pub async fn settle(&mut self) {
        while !self.pending.is_empty() || !self.reseeding.is_empty() {
            match self.warmup_rx.recv().await {
                Some(result) => self.handle_warmup(result).await,
                None => break,
            }
        }
    }

    /// Finish in-flight warm-ups, then let every worker drain and exit
    pub async fn shutdown(&mut self) {
        self.settle().await;

        let workers: Vec<(Pair, RunningPair)> = self.workers.drain().collect();
        for (pair, running) in workers {
            drop(running.handle.tx);
            if let Err(e) = running.handle.task.await {
                warn!("Worker for {} ended abnormally: {}", pair, e);
            }
        }
        info!("Stream manager stopped");
    }
}
