//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "market_data")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub exchange: String,
    pub asset: String,
    pub fiat: String,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub best_buy_price: Option<Decimal>, // highest price among buy ads
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub best_sell_price: Option<Decimal>, // lowest price among sell ads
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub average_buy_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub average_sell_price: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))", nullable)]
    pub spread: Option<Decimal>,
    pub ads_count: i32,
    pub captured_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
