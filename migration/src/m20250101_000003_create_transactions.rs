use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Transactions::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(Transactions::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Transactions::Exchange).string().not_null())
                    .col(ColumnDef::new(Transactions::OrderNumber).string().not_null())
                    .col(ColumnDef::new(Transactions::TransactionType).string().not_null()) // "p2p_buy", "p2p_sell", "spot_buy", ...
                    .col(ColumnDef::new(Transactions::Asset).string().not_null())
                    .col(ColumnDef::new(Transactions::Fiat).string().null())
                    .col(crate::decimal_column(manager, Transactions::Price, 20, 8).not_null().default(0))
                    .col(crate::decimal_column(manager, Transactions::Quantity, 20, 8).not_null().default(0))
                    .col(crate::decimal_column(manager, Transactions::TotalPrice, 20, 8).not_null().default(0))
                    .col(crate::decimal_column(manager, Transactions::Fee, 20, 8).not_null().default(0))
                    .col(ColumnDef::new(Transactions::FeeAsset).string().null())
                    .col(ColumnDef::new(Transactions::Status).string().not_null()) // "completed", "cancelled", "pending", ...
                    .col(ColumnDef::new(Transactions::PaymentMethod).string().null())
                    .col(ColumnDef::new(Transactions::CounterpartyNickname).string().null())
                    .col(ColumnDef::new(Transactions::CounterpartyMerchantNo).string().null())
                    .col(ColumnDef::new(Transactions::CounterpartyFullName).string().null())
                    .col(ColumnDef::new(Transactions::CounterpartyDni).string().null())
                    .col(ColumnDef::new(Transactions::CounterPartyId).big_integer().null())
                    .col(ColumnDef::new(Transactions::EnrichmentStatus).string().not_null().default("pending"))
                    .col(ColumnDef::new(Transactions::EnrichmentAttempts).integer().not_null().default(0))
                    .col(ColumnDef::new(Transactions::EnrichedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(Transactions::EnrichmentError).text().null())
                    .col(ColumnDef::new(Transactions::RawData).json().null())
                    .col(ColumnDef::new(Transactions::TransactionDate).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Transactions::CreatedAt).timestamp_with_time_zone().default(Expr::current_timestamp()))
                    .col(ColumnDef::new(Transactions::UpdatedAt).timestamp_with_time_zone().default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_user")
                            .from(Transactions::Table, Transactions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transactions_counter_party")
                            .from(Transactions::Table, Transactions::CounterPartyId)
                            .to(CounterParties::Table, CounterParties::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_transactions_order_number")
                    .table(Transactions::Table)
                    .col(Transactions::OrderNumber)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_transactions_user_date")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::TransactionDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_transactions_enrichment_status")
                    .table(Transactions::Table)
                    .col(Transactions::EnrichmentStatus)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    UserId,
    Exchange,
    OrderNumber,
    TransactionType,
    Asset,
    Fiat,
    Price,
    Quantity,
    TotalPrice,
    Fee,
    FeeAsset,
    Status,
    PaymentMethod,
    CounterpartyNickname,
    CounterpartyMerchantNo,
    CounterpartyFullName,
    CounterpartyDni,
    CounterPartyId,
    EnrichmentStatus,
    EnrichmentAttempts,
    EnrichedAt,
    EnrichmentError,
    RawData,
    TransactionDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum CounterParties {
    Table,
    Id,
}
