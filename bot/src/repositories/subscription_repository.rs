use super::{persistence, to_decimal, to_f64};
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, QueryOrder, Set};
use shared::entity::subscriptions;
use signal_engine::prelude::{EngineError, Interval, Subscription, SubscriptionStore};
use std::sync::Arc;
use tracing::warn;

pub struct SubscriptionRepository {
    db: Arc<DatabaseConnection>,
}

impl SubscriptionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create or reactivate the user's subscription for a pair
    pub async fn upsert(
        &self,
        user_id: i64,
        symbol: &str,
        interval: Interval,
        take_profit_percent: Option<f64>,
    ) -> anyhow::Result<Subscription> {
        let now = Utc::now();
        let take_profit = take_profit_percent.map(|tp| to_decimal(tp, 4));

        let existing = subscriptions::Entity::find()
            .filter(subscriptions::Column::UserId.eq(user_id))
            .filter(subscriptions::Column::Symbol.eq(symbol))
            .filter(subscriptions::Column::Interval.eq(interval.as_str()))
            .one(self.db.as_ref())
            .await?;

        let model = match existing {
            Some(model) => {
                let mut active: subscriptions::ActiveModel = model.into();
                active.active = Set(true);
                active.take_profit_percent = Set(take_profit);
                active.updated_at = Set(Some(now));
                active.update(self.db.as_ref()).await?
            }
            None => {
                let active = subscriptions::ActiveModel {
                    user_id: Set(user_id),
                    symbol: Set(symbol.to_string()),
                    interval: Set(interval.as_str().to_string()),
                    take_profit_percent: Set(take_profit),
                    active: Set(true),
                    created_at: Set(Some(now)),
                    updated_at: Set(Some(now)),
                    ..Default::default()
                };
                active.insert(self.db.as_ref()).await?
            }
        };

        to_subscription(model).ok_or_else(|| anyhow::anyhow!("stored subscription has an unknown interval"))
    }

    /// Returns `false` when the id is unknown, inactive or owned by someone else
    pub async fn deactivate(&self, user_id: i64, id: i64) -> anyhow::Result<bool> {
        let result = subscriptions::Entity::update_many()
            .col_expr(subscriptions::Column::Active, Expr::value(false))
            .col_expr(subscriptions::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(subscriptions::Column::Id.eq(id))
            .filter(subscriptions::Column::UserId.eq(user_id))
            .filter(subscriptions::Column::Active.eq(true))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    pub async fn list_for_user(&self, user_id: i64) -> anyhow::Result<Vec<Subscription>> {
        let models = subscriptions::Entity::find()
            .filter(subscriptions::Column::UserId.eq(user_id))
            .filter(subscriptions::Column::Active.eq(true))
            .order_by_asc(subscriptions::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(models.into_iter().filter_map(to_subscription).collect())
    }
}

/// Rows with an interval this build does not know are skipped
fn to_subscription(model: subscriptions::Model) -> Option<Subscription> {
    let interval = match model.interval.parse::<Interval>() {
        Ok(interval) => interval,
        Err(_) => {
            warn!(
                "Skipping subscription {} with unsupported interval '{}'",
                model.id, model.interval
            );
            return None;
        }
    };
    Some(Subscription {
        id: model.id,
        user_id: model.user_id,
        symbol: model.symbol,
        interval,
        take_profit_override: model.take_profit_percent.map(to_f64),
        active: model.active,
    })
}

#[async_trait]
impl SubscriptionStore for SubscriptionRepository {
    async fn list_active(&self) -> Result<Vec<Subscription>, EngineError> {
        let models = subscriptions::Entity::find()
            .filter(subscriptions::Column::Active.eq(true))
            .all(self.db.as_ref())
            .await
            .map_err(persistence)?;
        Ok(models.into_iter().filter_map(to_subscription).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn model(interval: &str) -> subscriptions::Model {
        subscriptions::Model {
            id: 3,
            user_id: 77,
            symbol: "SOLUSDT".to_string(),
            interval: interval.to_string(),
            take_profit_percent: Some(Decimal::new(25, 1)),
            active: true,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_to_subscription() {
        let sub = to_subscription(model("1h")).unwrap();
        assert_eq!(sub.interval, Interval::H1);
        assert_eq!(sub.take_profit_override, Some(2.5));
        assert_eq!(sub.pair().to_string(), "SOLUSDT@1h");
    }

    #[test]
    fn test_unknown_interval_is_skipped() {
        assert!(to_subscription(model("7m")).is_none());
    }
}
