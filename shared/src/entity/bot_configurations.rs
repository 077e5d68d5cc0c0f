//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;
use sea_orm::Select;
use rust_decimal::Decimal;
use crate::models::{BotProfile, Exchange, ParseEnumError, TradeSide};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "bot_configurations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub exchange: String,
    pub asset: String,
    pub fiat: String,
    pub trade_type: String, // side of our own ad: "buy" or "sell"
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub min_position: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub max_position: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub min_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub max_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub price_step: Decimal,
    pub profile: String, // "aggressive", "moderate", "conservative"
    pub own_nickname: Option<String>,
    pub is_active: bool,
    pub requires_approval: bool,
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(has_many = "super::bot_actions_log::Entity")]
    BotActionsLog,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::bot_actions_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BotActionsLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    pub fn find_active() -> Select<Entity> {
        Self::find().filter(Column::IsActive.eq(true))
    }
}

impl Model {
    pub fn exchange(&self) -> Result<Exchange, ParseEnumError> {
        self.exchange.parse()
    }

    pub fn side(&self) -> Result<TradeSide, ParseEnumError> {
        self.trade_type.parse()
    }

    pub fn profile(&self) -> Result<BotProfile, ParseEnumError> {
        self.profile.parse()
    }

    pub fn pair(&self) -> String {
        format!("{}/{}", self.asset, self.fiat)
    }
}
