//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "bot_actions_log")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub bot_configuration_id: i64,
    pub user_id: i64,
    pub action_type: String, // "update_price", "hold"
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub previous_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub proposed_price: Option<Decimal>,
    #[sea_orm(column_type = "Text")]
    pub reason: String,
    #[sea_orm(column_type = "Json", nullable)]
    pub market_snapshot: Option<Json>,
    pub status: String, // "pending_approval", "approved", "rejected"
    pub decided_at: Option<DateTimeUtc>,
    pub created_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::bot_configurations::Entity",
        from = "Column::BotConfigurationId",
        to = "super::bot_configurations::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    BotConfigurations,
}

impl Related<super::bot_configurations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BotConfigurations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
