//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;
use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "p2p_ads")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub exchange: String,
    pub adv_no: String,
    pub trade_type: String, // advertiser side: "buy" or "sell"
    pub asset: String,
    pub fiat: String,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub surplus_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub min_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub max_amount: Decimal,
    pub advertiser_nickname: String,
    pub advertiser_merchant_no: Option<String>,
    pub month_order_count: i32,
    #[sea_orm(column_type = "Decimal(Some((10, 4)))")]
    pub month_finish_rate: Decimal,
    #[sea_orm(column_type = "Json", nullable)]
    pub payment_methods: Option<Json>,
    pub rank: i32, // position in the marketplace listing, 1-based
    pub captured_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
