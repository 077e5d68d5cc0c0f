//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
    #[sea_orm(has_many = "super::bot_configurations::Entity")]
    BotConfigurations,
    #[sea_orm(has_many = "super::counter_parties::Entity")]
    CounterParties,
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl Related<super::bot_configurations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BotConfigurations.def()
    }
}

impl Related<super::counter_parties::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CounterParties.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
