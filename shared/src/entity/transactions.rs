//! `SeaORM` Entity, @generated manually

use sea_orm::entity::prelude::*;
use sea_orm::{Condition, QueryOrder, Select};
use rust_decimal::Decimal;
use crate::models::{EnrichmentStatus, Exchange, ParseEnumError, TransactionType};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub exchange: String,
    #[sea_orm(unique)]
    pub order_number: String,
    pub transaction_type: String, // "p2p_buy", "p2p_sell", "spot_buy", "spot_sell", "deposit", "withdrawal"
    pub asset: String,
    pub fiat: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub total_price: Decimal,
    #[sea_orm(column_type = "Decimal(Some((20, 8)))")]
    pub fee: Decimal,
    pub fee_asset: Option<String>,
    pub status: String,
    pub payment_method: Option<String>,
    pub counterparty_nickname: Option<String>,
    pub counterparty_merchant_no: Option<String>,
    pub counterparty_full_name: Option<String>,
    pub counterparty_dni: Option<String>,
    pub counter_party_id: Option<i64>,
    pub enrichment_status: String, // "pending", "processing", "completed", "failed", "skipped"
    pub enrichment_attempts: i32,
    pub enriched_at: Option<DateTimeUtc>,
    #[sea_orm(column_type = "Text", nullable)]
    pub enrichment_error: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub raw_data: Option<Json>,
    pub transaction_date: DateTimeUtc,
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
    #[sea_orm(
        belongs_to = "super::counter_parties::Entity",
        from = "Column::CounterPartyId",
        to = "super::counter_parties::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    CounterParties,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::counter_parties::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CounterParties.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Entity {
    pub fn find_by_order_number(order_number: &str) -> Select<Entity> {
        Self::find().filter(Column::OrderNumber.eq(order_number))
    }

    /// P2P buys and sells only.
    pub fn p2p_condition() -> Condition {
        Condition::all().add(
            Column::TransactionType
                .is_in([TransactionType::P2pBuy.as_str(), TransactionType::P2pSell.as_str()]),
        )
    }

    /// Transactions waiting for enrichment, oldest first.
    pub fn find_pending_enrichment() -> Select<Entity> {
        Self::find()
            .filter(Column::EnrichmentStatus.eq(EnrichmentStatus::Pending.as_str()))
            .order_by_asc(Column::TransactionDate)
            .order_by_asc(Column::Id)
    }

    pub fn find_between(from: DateTimeUtc, to: DateTimeUtc) -> Select<Entity> {
        Self::find()
            .filter(Column::TransactionDate.gte(from))
            .filter(Column::TransactionDate.lte(to))
    }
}

impl Model {
    pub fn exchange(&self) -> Result<Exchange, ParseEnumError> {
        self.exchange.parse()
    }

    pub fn transaction_type(&self) -> Result<TransactionType, ParseEnumError> {
        self.transaction_type.parse()
    }

    pub fn enrichment_status(&self) -> Result<EnrichmentStatus, ParseEnumError> {
        self.enrichment_status.parse()
    }

    pub fn is_p2p(&self) -> bool {
        self.transaction_type().map(|t| t.is_p2p()).unwrap_or(false)
    }

    /// True when the row carries enough to identify the counterparty.
    pub fn has_counterparty_identity(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);
        present(&self.counterparty_nickname) || present(&self.counterparty_merchant_no)
    }
}
