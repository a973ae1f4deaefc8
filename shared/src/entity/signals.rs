//! `SeaORM` Entity, @generated manually

use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "signals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String, // UUID v4
    pub scope_kind: String, // "channel" or "user"
    pub scope_id: i64,
    pub symbol: String,
    pub interval: String,
    pub side: String, // "long" or "short"
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub entry_price: Decimal,
    pub entry_time: DateTimeUtc,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))")]
    pub take_profit_percent: Decimal,
    pub validity_hours: u32,
    pub status: String, // "active", "success", "failure"
    #[sea_orm(column_type = "Decimal(Some((10, 4)))")]
    pub max_favorable_excursion: Decimal,
    pub notified: bool,
    pub message_id: Option<i32>, // Telegram message announcing the signal
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub exit_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))", nullable)]
    pub pnl_percent: Option<Decimal>,
    pub closed_at: Option<DateTimeUtc>,
    pub created_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
