//! Serial worker owning one pair's state

use crate::data::{Candle, Pair};
use crate::lifecycle::{ScopeTarget, SignalLifecycleManager};
use crate::strategy::{PairState, SignalGenerator};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Message to a pair worker; processed strictly in arrival order
#[derive(Debug, Clone)]
pub enum PairCommand {
    /// A closed candle for the pair
    Candle(Candle),
    /// Scopes now interested in the pair
    Targets(Vec<ScopeTarget>),
    /// Fresh history after the upstream stream restarted
    Reseed(Vec<Candle>),
}

/// Sending side of a running worker
pub struct PairHandle {
    pub tx: mpsc::Sender<PairCommand>,
    pub task: JoinHandle<()>,
}

pub struct PairWorker {
    state: PairState,
    targets: Vec<ScopeTarget>,
    generator: Arc<SignalGenerator>,
    lifecycle: Arc<SignalLifecycleManager>,
}

impl PairWorker {
    pub fn new(
        state: PairState,
        targets: Vec<ScopeTarget>,
        generator: Arc<SignalGenerator>,
        lifecycle: Arc<SignalLifecycleManager>,
    ) -> Self {
        Self {
            state,
            targets,
            generator,
            lifecycle,
        }
    }

    pub fn pair(&self) -> &Pair {
        self.state.pair()
    }

    pub fn state(&self) -> &PairState {
        &self.state
    }

    /// Run on its own task until every sender is dropped
    pub fn spawn(self, queue: usize) -> PairHandle {
        let (tx, rx) = mpsc::channel(queue.max(1));
        let task = tokio::spawn(self.run(rx));
        PairHandle { tx, task }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<PairCommand>) {
        info!("Worker started for {}", self.pair());
        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
        info!("Worker stopped for {}", self.pair());
    }

    pub async fn handle(&mut self, command: PairCommand) {
        match command {
            PairCommand::Candle(candle) => self.on_candle(candle).await,
            PairCommand::Targets(targets) => self.targets = targets,
            PairCommand::Reseed(history) => self.state.reseed(history),
        }
    }

    /// Full pipeline for one closed candle
    pub async fn on_candle(&mut self, candle: Candle) {
        let pair = self.state.pair().clone();
        if !self.state.apply(candle.clone()) {
            debug!("{}: ignoring stale candle {}", pair, candle.start_time);
            return;
        }
        let now = candle.close_time(pair.interval);

        if let Err(e) = self.lifecycle.evaluate(&pair, &candle, now).await {
            warn!("{}: failed to evaluate active signals: {}", pair, e);
        }

        let open = match self.lifecycle.open_targets(&pair, &self.targets).await {
            Ok(open) => open,
            Err(e) => {
                warn!("{}: failed to load active signals: {}", pair, e);
                Vec::new()
            }
        };

        let candidate = match self.generator.evaluate(&mut self.state, !open.is_empty()).await {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return,
            Err(e) if e.is_data_gap() => {
                debug!("{}: skipping evaluation: {}", pair, e);
                return;
            }
            Err(e) => {
                warn!("{}: signal evaluation failed: {}", pair, e);
                return;
            }
        };

        for target in &open {
            if let Err(e) = self.lifecycle.create(&candidate, target).await {
                warn!("{}: no signal for {}: {}", pair, target.scope, e);
            }
        }
    }
}
