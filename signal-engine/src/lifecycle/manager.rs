//! Signal lifecycle: creation, excursion tracking and resolution

use crate::data::{Candle, Pair};
use crate::error::EngineError;
use crate::lifecycle::{ScopeTarget, Signal, SignalScope, SignalStatus, SignalUpdate};
use crate::ports::{Notifier, SignalStore};
use crate::strategy::SignalCandidate;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

type ScopeKey = (SignalScope, Pair);

/// Owns every transition of a signal.
///
/// Work on one (scope, pair) key is serialized through that key's mutex, so
/// two candles in flight can neither create two active signals for a scope
/// nor resolve the same signal twice.
pub struct SignalLifecycleManager {
    store: Arc<dyn SignalStore>,
    notifier: Arc<dyn Notifier>,
    locks: Mutex<HashMap<ScopeKey, Arc<Mutex<()>>>>,
}

impl SignalLifecycleManager {
    pub fn new(store: Arc<dyn SignalStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock(&self, scope: SignalScope, pair: &Pair) -> OwnedMutexGuard<()> {
        let key_lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry((scope, pair.clone()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        key_lock.lock_owned().await
    }

    /// Drop the key's mutex once nobody but the map holds it
    async fn release(&self, scope: SignalScope, pair: &Pair) {
        let mut locks = self.locks.lock().await;
        let key = (scope, pair.clone());
        if locks.get(&key).is_some_and(|l| Arc::strong_count(l) == 1) {
            locks.remove(&key);
        }
    }

    /// Number of (scope, pair) keys currently holding a mutex
    pub async fn lock_count(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn has_active(&self, scope: SignalScope, pair: &Pair) -> Result<bool, EngineError> {
        Ok(self.store.find_active_by_scope(pair, scope).await?.is_some())
    }

    /// Targets of `pair` that currently have no active signal
    pub async fn open_targets(
        &self,
        pair: &Pair,
        targets: &[ScopeTarget],
    ) -> Result<Vec<ScopeTarget>, EngineError> {
        let active = self.store.find_active_by_pair(pair).await?;
        Ok(targets
            .iter()
            .filter(|t| !active.iter().any(|s| s.scope == t.scope))
            .copied()
            .collect())
    }

    /// Persist and announce a new signal for one scope.
    ///
    /// Fails with [`EngineError::InvariantViolation`] when the scope already
    /// has an active signal for the pair; nothing is written in that case.
    pub async fn create(
        &self,
        candidate: &SignalCandidate,
        target: &ScopeTarget,
    ) -> Result<Signal, EngineError> {
        let _guard = self.lock(target.scope, &candidate.pair).await;

        if let Some(existing) = self
            .store
            .find_active_by_scope(&candidate.pair, target.scope)
            .await?
        {
            warn!(
                "Dropping {} candidate for {} ({}): signal {} still active",
                candidate.side, candidate.pair, target.scope, existing.id
            );
            return Err(EngineError::InvariantViolation(format!(
                "{} {}",
                target.scope, candidate.pair
            )));
        }

        let mut signal = Signal::open(candidate, target);
        self.store.save(&signal).await?;
        info!(
            "Created {} signal {} for {} ({}) at {:.4}, take profit {:.2}%",
            signal.side,
            signal.id,
            signal.pair,
            signal.scope,
            signal.entry_price,
            signal.take_profit_percent
        );

        match self.notifier.notify(signal.scope, &signal).await {
            Ok(message_ref) => {
                signal.message_ref = Some(message_ref);
                if let Err(e) = self.store.set_message_ref(signal.id, message_ref).await {
                    warn!("Failed to record message for signal {}: {}", signal.id, e);
                }
            }
            Err(e) => warn!("Failed to announce signal {}: {}", signal.id, e),
        }

        Ok(signal)
    }

    /// Track every active signal of `pair` against a closed candle.
    ///
    /// `now` is the close time of `candle`. Returns the transitions that
    /// were applied.
    pub async fn evaluate(
        &self,
        pair: &Pair,
        candle: &Candle,
        now: DateTime<Utc>,
    ) -> Result<Vec<SignalUpdate>, EngineError> {
        let active = self.store.find_active_by_pair(pair).await?;
        let mut updates = Vec::new();

        for signal in active {
            let scope = signal.scope;
            let guard = self.lock(scope, pair).await;
            let update = self.evaluate_signal(signal, candle, now).await;
            drop(guard);

            if let Some(update) = update {
                self.release(scope, pair).await;
                updates.push(update);
            }
        }

        Ok(updates)
    }

    async fn evaluate_signal(
        &self,
        mut signal: Signal,
        candle: &Candle,
        now: DateTime<Utc>,
    ) -> Option<SignalUpdate> {
        if !signal.is_active() {
            return None;
        }

        let excursion = signal.excursion(candle);
        if excursion > signal.max_favorable_excursion {
            if let Err(e) = self.store.update_excursion(signal.id, excursion).await {
                warn!("Failed to store excursion for signal {}: {}", signal.id, e);
                return None;
            }
            signal.max_favorable_excursion = excursion;
        }

        let (status, pnl_percent) = if signal.max_favorable_excursion >= signal.take_profit_percent
        {
            (SignalStatus::Success, signal.max_favorable_excursion)
        } else if signal.is_expired(now) {
            (SignalStatus::Failure, signal.move_percent(candle.close))
        } else {
            return None;
        };
        let exit_price = candle.close;

        match self
            .store
            .update_status(signal.id, status, exit_price, pnl_percent, now)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!("Signal {} already resolved", signal.id);
                return None;
            }
            Err(e) => {
                warn!("Failed to resolve signal {} as {}: {}", signal.id, status, e);
                return None;
            }
        }

        signal.status = status;
        signal.exit_price = Some(exit_price);
        signal.pnl_percent = Some(pnl_percent);
        signal.closed_at = Some(now);
        info!(
            "Signal {} on {} ({}) resolved as {}: exit {:.4}, pnl {:.2}%",
            signal.id, signal.pair, signal.scope, status, exit_price, pnl_percent
        );

        let update = SignalUpdate {
            status,
            exit_price,
            pnl_percent,
            closed_at: now,
            signal,
        };

        match self
            .notifier
            .reply(update.signal.scope, update.signal.message_ref, &update)
            .await
        {
            Ok(()) => {
                if let Err(e) = self.store.mark_notified(update.signal.id).await {
                    warn!("Failed to mark signal {} notified: {}", update.signal.id, e);
                }
            }
            Err(e) => warn!("Failed to report signal {}: {}", update.signal.id, e),
        }

        Some(update)
    }

    /// Delete terminal signals past retention
    pub async fn cleanup(&self, retention_days: u32) -> Result<u64, EngineError> {
        let deleted = self.store.delete_older_than(retention_days).await?;
        if deleted > 0 {
            info!("Deleted {} signals older than {} days", deleted, retention_days);
        }
        Ok(deleted)
    }
}
