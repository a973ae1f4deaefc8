use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Subscriptions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Subscriptions::Id).big_integer().auto_increment().primary_key())
                    .col(ColumnDef::new(Subscriptions::UserId).big_integer().not_null()) // Telegram user id
                    .col(ColumnDef::new(Subscriptions::Symbol).string_len(32).not_null())
                    .col(ColumnDef::new(Subscriptions::Interval).string_len(8).not_null())
                    .col(ColumnDef::new(Subscriptions::TakeProfitPercent).decimal_len(10, 4).null())
                    .col(ColumnDef::new(Subscriptions::Active).boolean().not_null().default(true))
                    .col(ColumnDef::new(Subscriptions::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .col(ColumnDef::new(Subscriptions::UpdatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("uq_subscriptions_user_pair")
                            .table(Subscriptions::Table)
                            .col(Subscriptions::UserId)
                            .col(Subscriptions::Symbol)
                            .col(Subscriptions::Interval)
                            .unique()
                    )
                    .index(
                        Index::create()
                            .name("idx_subscriptions_active")
                            .table(Subscriptions::Table)
                            .col(Subscriptions::Active)
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Subscriptions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Subscriptions {
    Table,
    Id,
    UserId,
    Symbol,
    Interval,
    TakeProfitPercent,
    Active,
    CreatedAt,
    UpdatedAt,
}
