use super::{persistence, to_decimal, to_f64};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sea_orm::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{QueryOrder, QuerySelect, Set, UpdateMany};
use shared::entity::signals;
use signal_engine::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

const PRICE_SCALE: u32 = 8;
const PERCENT_SCALE: u32 = 4;

pub struct SignalRepository {
    db: Arc<DatabaseConnection>,
}

impl SignalRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Latest signals for a scope, newest first
    pub async fn recent_for_scope(&self, scope: SignalScope, limit: u64) -> anyhow::Result<Vec<Signal>> {
        let models = signals::Entity::find()
            .filter(signals::Column::ScopeKind.eq(scope.kind()))
            .filter(signals::Column::ScopeId.eq(scope.target_id()))
            .order_by_desc(signals::Column::EntryTime)
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        models
            .into_iter()
            .map(|m| to_signal(m).map_err(anyhow::Error::from))
            .collect()
    }
}

fn corrupt(what: &str, value: &str) -> EngineError {
    EngineError::Persistence(anyhow!("invalid {} '{}' in signals table", what, value))
}

fn to_signal(model: signals::Model) -> Result<Signal, EngineError> {
    let id = Uuid::parse_str(&model.id).map_err(|_| corrupt("id", &model.id))?;
    let scope = SignalScope::from_parts(&model.scope_kind, model.scope_id)
        .ok_or_else(|| corrupt("scope", &model.scope_kind))?;
    let interval: Interval = model
        .interval
        .parse()
        .map_err(|_| corrupt("interval", &model.interval))?;
    let side: Side = model.side.parse().map_err(|_| corrupt("side", &model.side))?;
    let status: SignalStatus = model
        .status
        .parse()
        .map_err(|_| corrupt("status", &model.status))?;

    Ok(Signal {
        id,
        scope,
        pair: Pair::new(&model.symbol, interval),
        side,
        entry_price: to_f64(model.entry_price),
        entry_time: model.entry_time,
        take_profit_percent: to_f64(model.take_profit_percent),
        validity_hours: model.validity_hours,
        status,
        max_favorable_excursion: to_f64(model.max_favorable_excursion),
        notified: model.notified,
        message_ref: model.message_id.map(MessageRef),
        exit_price: model.exit_price.map(to_f64),
        pnl_percent: model.pnl_percent.map(to_f64),
        closed_at: model.closed_at,
    })
}

fn to_active_model(signal: &Signal) -> signals::ActiveModel {
    signals::ActiveModel {
        id: Set(signal.id.to_string()),
        scope_kind: Set(signal.scope.kind().to_string()),
        scope_id: Set(signal.scope.target_id()),
        symbol: Set(signal.pair.symbol.clone()),
        interval: Set(signal.pair.interval.as_str().to_string()),
        side: Set(signal.side.as_str().to_string()),
        entry_price: Set(to_decimal(signal.entry_price, PRICE_SCALE)),
        entry_time: Set(signal.entry_time),
        take_profit_percent: Set(to_decimal(signal.take_profit_percent, PERCENT_SCALE)),
        validity_hours: Set(signal.validity_hours),
        status: Set(signal.status.as_str().to_string()),
        max_favorable_excursion: Set(to_decimal(signal.max_favorable_excursion, PERCENT_SCALE)),
        notified: Set(signal.notified),
        message_id: Set(signal.message_ref.map(|r| r.0)),
        exit_price: Set(signal.exit_price.map(|p| to_decimal(p, PRICE_SCALE))),
        pnl_percent: Set(signal.pnl_percent.map(|p| to_decimal(p, PERCENT_SCALE))),
        closed_at: Set(signal.closed_at),
        created_at: Set(Some(Utc::now())),
    }
}

#[async_trait]
impl SignalStore for SignalRepository {
    async fn save(&self, signal: &Signal) -> Result<(), EngineError> {
        signals::Entity::insert(to_active_model(signal))
            .exec_without_returning(self.db.as_ref())
            .await
            .map_err(persistence)?;
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
        // Only an active row may transition; a concurrent resolution leaves it untouched
        let result = signals::Entity::update_many()
            .col_expr(signals::Column::Status, Expr::value(status.as_str()))
            .col_expr(
                signals::Column::ExitPrice,
                Expr::value(to_decimal(exit_price, PRICE_SCALE)),
            )
            .col_expr(
                signals::Column::PnlPercent,
                Expr::value(to_decimal(pnl_percent, PERCENT_SCALE)),
            )
            .col_expr(signals::Column::ClosedAt, Expr::value(closed_at))
            .filter(signals::Column::Id.eq(id.to_string()))
            .filter(signals::Column::Status.eq(SignalStatus::Active.as_str()))
            .exec(self.db.as_ref())
            .await
            .map_err(persistence)?;
        Ok(result.rows_affected == 1)
    }

    async fn update_excursion(
        &self,
        id: Uuid,
        max_favorable_excursion: f64,
    ) -> Result<(), EngineError> {
        signals::Entity::update_many()
            .col_expr(
                signals::Column::MaxFavorableExcursion,
                Expr::value(to_decimal(max_favorable_excursion, PERCENT_SCALE)),
            )
            .filter(signals::Column::Id.eq(id.to_string()))
            .exec(self.db.as_ref())
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn set_message_ref(&self, id: Uuid, message_ref: MessageRef) -> Result<(), EngineError> {
        set_message_ref_query(id, message_ref)
            .exec(self.db.as_ref())
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn mark_notified(&self, id: Uuid) -> Result<(), EngineError> {
        mark_notified_query(id)
            .exec(self.db.as_ref())
            .await
            .map_err(persistence)?;
        Ok(())
    }

    async fn find_active_by_scope(
        &self,
        pair: &Pair,
        scope: SignalScope,
    ) -> Result<Option<Signal>, EngineError> {
        signals::Entity::find()
            .filter(signals::Column::Symbol.eq(pair.symbol.as_str()))
            .filter(signals::Column::Interval.eq(pair.interval.as_str()))
            .filter(signals::Column::ScopeKind.eq(scope.kind()))
            .filter(signals::Column::ScopeId.eq(scope.target_id()))
            .filter(signals::Column::Status.eq(SignalStatus::Active.as_str()))
            .one(self.db.as_ref())
            .await
            .map_err(persistence)?
            .map(to_signal)
            .transpose()
    }

    async fn find_active_by_pair(&self, pair: &Pair) -> Result<Vec<Signal>, EngineError> {
        signals::Entity::find()
            .filter(signals::Column::Symbol.eq(pair.symbol.as_str()))
            .filter(signals::Column::Interval.eq(pair.interval.as_str()))
            .filter(signals::Column::Status.eq(SignalStatus::Active.as_str()))
            .order_by_asc(signals::Column::EntryTime)
            .all(self.db.as_ref())
            .await
            .map_err(persistence)?
            .into_iter()
            .map(to_signal)
            .collect()
    }

    async fn delete_older_than(&self, days: u32) -> Result<u64, EngineError> {
        let cutoff = Utc::now() - Duration::days(i64::from(days));
        let result = signals::Entity::delete_many()
            .filter(signals::Column::Status.ne(SignalStatus::Active.as_str()))
            .filter(signals::Column::EntryTime.lt(cutoff))
            .exec(self.db.as_ref())
            .await
            .map_err(persistence)?;
        Ok(result.rows_affected)
    }
}

/// Records the announcement message; `notified` waits for the terminal reply
fn set_message_ref_query(id: Uuid, message_ref: MessageRef) -> UpdateMany<signals::Entity> {
    signals::Entity::update_many()
        .col_expr(signals::Column::MessageId, Expr::value(message_ref.0))
        .filter(signals::Column::Id.eq(id.to_string()))
}

fn mark_notified_query(id: Uuid) -> UpdateMany<signals::Entity> {
    signals::Entity::update_many()
        .col_expr(signals::Column::Notified, Expr::value(true))
        .filter(signals::Column::Id.eq(id.to_string()))
}
