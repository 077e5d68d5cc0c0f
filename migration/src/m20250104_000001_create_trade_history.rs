use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TradeHistory::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(TradeHistory::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(TradeHistory::UserId).big_integer().not_null())
                    .col(ColumnDef::new(TradeHistory::TransactionId).big_integer().null())
                    .col(ColumnDef::new(TradeHistory::Exchange).string().not_null())
                    .col(ColumnDef::new(TradeHistory::OrderNumber).string().not_null())
                    .col(ColumnDef::new(TradeHistory::TradeType).string().not_null()) // "buy" or "sell"
                    .col(ColumnDef::new(TradeHistory::Asset).string().not_null())
                    .col(ColumnDef::new(TradeHistory::Fiat).string().not_null())
                    .col(crate::decimal_column(manager, TradeHistory::Price, 20, 8).not_null())
                    .col(crate::decimal_column(manager, TradeHistory::Quantity, 20, 8).not_null())
                    .col(crate::decimal_column(manager, TradeHistory::TotalPrice, 20, 8).not_null())
                    .col(crate::decimal_column(manager, TradeHistory::Fee, 20, 8).not_null().default(0))
                    .col(ColumnDef::new(TradeHistory::CounterPartyId).big_integer().null())
                    .col(ColumnDef::new(TradeHistory::CompletedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(TradeHistory::CreatedAt).timestamp_with_time_zone().default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_trade_history_user")
                            .from(TradeHistory::Table, TradeHistory::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_trade_history_transaction")
                            .from(TradeHistory::Table, TradeHistory::TransactionId)
                            .to(Transactions::Table, Transactions::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_trade_history_order_number")
                    .table(TradeHistory::Table)
                    .col(TradeHistory::OrderNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_trade_history_user_completed")
                    .table(TradeHistory::Table)
                    .col(TradeHistory::UserId)
                    .col(TradeHistory::CompletedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TradeHistory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TradeHistory {
    Table,
    Id,
    UserId,
    TransactionId,
    Exchange,
    OrderNumber,
    TradeType,
    Asset,
    Fiat,
    Price,
    Quantity,
    TotalPrice,
    Fee,
    CounterPartyId,
    CompletedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
}
