use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Signals::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Signals::Id).char_len(36).not_null().primary_key())
                    .col(ColumnDef::new(Signals::ScopeKind).string_len(16).not_null()) // "channel" or "user"
                    .col(ColumnDef::new(Signals::ScopeId).big_integer().not_null())
                    .col(ColumnDef::new(Signals::Symbol).string_len(32).not_null())
                    .col(ColumnDef::new(Signals::Interval).string_len(8).not_null())
                    .col(ColumnDef::new(Signals::Side).string_len(8).not_null()) // "long" or "short"
                    .col(ColumnDef::new(Signals::EntryPrice).decimal_len(20, 8).not_null())
                    .col(ColumnDef::new(Signals::EntryTime).timestamp().not_null())
                    .col(ColumnDef::new(Signals::TakeProfitPercent).decimal_len(10, 4).not_null())
                    .col(ColumnDef::new(Signals::ValidityHours).unsigned().not_null())
                    .col(ColumnDef::new(Signals::Status).string_len(16).not_null().default("active"))
                    .col(ColumnDef::new(Signals::MaxFavorableExcursion).decimal_len(10, 4).not_null().default(0))
                    .col(ColumnDef::new(Signals::Notified).boolean().not_null().default(false))
                    .col(ColumnDef::new(Signals::MessageId).integer().null())
                    .col(ColumnDef::new(Signals::ExitPrice).decimal_len(20, 8).null())
                    .col(ColumnDef::new(Signals::PnlPercent).decimal_len(10, 4).null())
                    .col(ColumnDef::new(Signals::ClosedAt).timestamp().null())
                    .col(ColumnDef::new(Signals::CreatedAt).timestamp().default(Expr::cust("CURRENT_TIMESTAMP")))
                    .index(
                        Index::create()
                            .name("idx_signals_pair_status")
                            .table(Signals::Table)
                            .col(Signals::Symbol)
                            .col(Signals::Interval)
                            .col(Signals::Status)
                    )
                    .index(
                        Index::create()
                            .name("idx_signals_scope_status")
                            .table(Signals::Table)
                            .col(Signals::ScopeKind)
                            .col(Signals::ScopeId)
                            .col(Signals::Status)
                    )
                    .index(
                        Index::create()
                            .name("idx_signals_entry_time")
                            .table(Signals::Table)
                            .col(Signals::EntryTime)
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Signals::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Signals {
    Table,
    Id,
    ScopeKind,
    ScopeId,
    Symbol,
    Interval,
    Side,
    EntryPrice,
    EntryTime,
    TakeProfitPercent,
    ValidityHours,
    Status,
    MaxFavorableExcursion,
    Notified,
    MessageId,
    ExitPrice,
    PnlPercent,
    ClosedAt,
    CreatedAt,
}
