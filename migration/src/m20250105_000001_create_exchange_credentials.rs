use sea_orm_migration::prelude::*;

const CREDENTIAL_TABLES: [&str; 3] = ["binance_credentials", "bybit_credentials", "okx_credentials"];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in CREDENTIAL_TABLES {
            let mut create = Table::create();
            create
                .table(Alias::new(table))
                .if_not_exists()
                .col(ColumnDef::new(Credentials::Id).big_integer().not_null().auto_increment().primary_key())
                .col(ColumnDef::new(Credentials::UserId).big_integer().not_null())
                .col(ColumnDef::new(Credentials::ApiKey).text().not_null()) // encrypted
                .col(ColumnDef::new(Credentials::ApiSecret).text().not_null()) // encrypted
                .col(ColumnDef::new(Credentials::IsActive).boolean().not_null().default(true))
                .col(ColumnDef::new(Credentials::LastSyncedAt).timestamp_with_time_zone().null())
                .col(ColumnDef::new(Credentials::CreatedAt).timestamp_with_time_zone().default(Expr::current_timestamp()))
                .col(ColumnDef::new(Credentials::UpdatedAt).timestamp_with_time_zone().default(Expr::current_timestamp()))
                .foreign_key(
                    ForeignKey::create()
                        .name(format!("fk_{}_user", table))
                        .from(Alias::new(table), Credentials::UserId)
                        .to(Users::Table, Users::Id)
                        .on_delete(ForeignKeyAction::Cascade),
                );
            if table == "okx_credentials" {
                create.col(ColumnDef::new(Credentials::Passphrase).text().null()); // encrypted
            }
            manager.create_table(create.to_owned()).await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name(format!("idx_{}_user", table))
                        .table(Alias::new(table))
                        .col(Credentials::UserId)
                        .unique()
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in CREDENTIAL_TABLES {
            manager
                .drop_table(Table::drop().table(Alias::new(table)).to_owned())
                .await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Credentials {
    Id,
    UserId,
    ApiKey,
    ApiSecret,
    Passphrase,
    IsActive,
    LastSyncedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
