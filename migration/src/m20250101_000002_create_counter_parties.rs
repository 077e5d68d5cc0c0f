use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CounterParties::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CounterParties::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(CounterParties::UserId).big_integer().not_null())
                    .col(ColumnDef::new(CounterParties::Exchange).string().not_null()) // "binance", "bybit", "okx"
                    .col(ColumnDef::new(CounterParties::Nickname).string().not_null())
                    .col(ColumnDef::new(CounterParties::MerchantNo).string().null())
                    .col(ColumnDef::new(CounterParties::FullName).string().null())
                    .col(ColumnDef::new(CounterParties::Dni).string().null())
                    .col(ColumnDef::new(CounterParties::FirstSeenAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(CounterParties::LastSeenAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(CounterParties::CreatedAt).timestamp_with_time_zone().default(Expr::current_timestamp()))
                    .col(ColumnDef::new(CounterParties::UpdatedAt).timestamp_with_time_zone().default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_counter_parties_user")
                            .from(CounterParties::Table, CounterParties::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_counter_parties_identity")
                    .table(CounterParties::Table)
                    .col(CounterParties::UserId)
                    .col(CounterParties::Exchange)
                    .col(CounterParties::Nickname)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_counter_parties_merchant")
                    .table(CounterParties::Table)
                    .col(CounterParties::UserId)
                    .col(CounterParties::Exchange)
                    .col(CounterParties::MerchantNo)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CounterParties::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum CounterParties {
    Table,
    Id,
    UserId,
    Exchange,
    Nickname,
    MerchantNo,
    FullName,
    Dni,
    FirstSeenAt,
    LastSeenAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
