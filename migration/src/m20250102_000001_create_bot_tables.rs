use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Per-user P2P posting strategy
        manager
            .create_table(
                Table::create()
                    .table(BotConfigurations::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BotConfigurations::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(BotConfigurations::UserId).big_integer().not_null())
                    .col(ColumnDef::new(BotConfigurations::Name).string().not_null())
                    .col(ColumnDef::new(BotConfigurations::Exchange).string().not_null().default("binance"))
                    .col(ColumnDef::new(BotConfigurations::Asset).string().not_null())
                    .col(ColumnDef::new(BotConfigurations::Fiat).string().not_null())
                    .col(ColumnDef::new(BotConfigurations::TradeType).string().not_null()) // "buy" or "sell"
                    .col(crate::decimal_column(manager, BotConfigurations::MinPosition, 20, 8).not_null())
                    .col(crate::decimal_column(manager, BotConfigurations::MaxPosition, 20, 8).not_null())
                    .col(crate::decimal_column(manager, BotConfigurations::MinPrice, 20, 8).not_null())
                    .col(crate::decimal_column(manager, BotConfigurations::MaxPrice, 20, 8).not_null())
                    .col(crate::decimal_column(manager, BotConfigurations::PriceStep, 20, 8).not_null().default(0.01))
                    .col(ColumnDef::new(BotConfigurations::Profile).string().not_null().default("moderate"))
                    .col(ColumnDef::new(BotConfigurations::OwnNickname).string().null())
                    .col(ColumnDef::new(BotConfigurations::IsActive).boolean().not_null().default(false))
                    .col(ColumnDef::new(BotConfigurations::RequiresApproval).boolean().not_null().default(true))
                    .col(ColumnDef::new(BotConfigurations::CreatedAt).timestamp_with_time_zone().default(Expr::current_timestamp()))
                    .col(ColumnDef::new(BotConfigurations::UpdatedAt).timestamp_with_time_zone().default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bot_configurations_user")
                            .from(BotConfigurations::Table, BotConfigurations::UserId)
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
                    .name("idx_bot_configurations_user_active")
                    .table(BotConfigurations::Table)
                    .col(BotConfigurations::UserId)
                    .col(BotConfigurations::IsActive)
                    .to_owned(),
            )
            .await?;

        // Audit trail of bot decisions
        manager
            .create_table(
                Table::create()
                    .table(BotActionsLog::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(BotActionsLog::Id).big_integer().not_null().auto_increment().primary_key())
                    .col(ColumnDef::new(BotActionsLog::BotConfigurationId).big_integer().not_null())
                    .col(ColumnDef::new(BotActionsLog::UserId).big_integer().not_null())
                    .col(ColumnDef::new(BotActionsLog::ActionType).string().not_null()) // "update_price", "hold"
                    .col(crate::decimal_column(manager, BotActionsLog::PreviousPrice, 20, 8).null())
                    .col(crate::decimal_column(manager, BotActionsLog::ProposedPrice, 20, 8).null())
                    .col(ColumnDef::new(BotActionsLog::Reason).text().not_null())
                    .col(ColumnDef::new(BotActionsLog::MarketSnapshot).json().null())
                    .col(ColumnDef::new(BotActionsLog::Status).string().not_null().default("pending_approval"))
                    .col(ColumnDef::new(BotActionsLog::DecidedAt).timestamp_with_time_zone().null())
                    .col(ColumnDef::new(BotActionsLog::CreatedAt).timestamp_with_time_zone().default(Expr::current_timestamp()))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_bot_actions_log_configuration")
                            .from(BotActionsLog::Table, BotActionsLog::BotConfigurationId)
                            .to(BotConfigurations::Table, BotConfigurations::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_bot_actions_log_configuration_status")
                    .table(BotActionsLog::Table)
                    .col(BotActionsLog::BotConfigurationId)
                    .col(BotActionsLog::Status)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BotActionsLog::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BotConfigurations::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum BotConfigurations {
    Table,
    Id,
    UserId,
    Name,
    Exchange,
    Asset,
    Fiat,
    TradeType,
    MinPosition,
    MaxPosition,
    MinPrice,
    MaxPrice,
    PriceStep,
    Profile,
    OwnNickname,
    IsActive,
    RequiresApproval,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum BotActionsLog {
    Table,
    Id,
    BotConfigurationId,
    UserId,
    ActionType,
    PreviousPrice,
    ProposedPrice,
    Reason,
    MarketSnapshot,
    Status,
    DecidedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}
