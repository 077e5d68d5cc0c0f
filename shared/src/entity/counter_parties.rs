//! `SeaORM` Entity, @generated manually
//!
//! A counterparty is deduplicated per user and exchange by merchant number
//! or nickname. Saving one through the model backfills its identity onto the
//! matching `transactions` rows.

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveValue, Condition};
use chrono::Utc;
use super::transactions;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "counter_parties")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub exchange: String,
    pub nickname: String,
    pub merchant_no: Option<String>,
    pub full_name: Option<String>,
    pub dni: Option<String>,
    pub first_seen_at: Option<DateTimeUtc>,
    pub last_seen_at: Option<DateTimeUtc>,
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
    #[sea_orm(has_many = "super::transactions::Entity")]
    Transactions,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn after_save<C>(model: Model, db: &C, insert: bool) -> Result<Model, DbErr>
    where
        C: ConnectionTrait,
    {
        let updated = backfill_transactions(db, &model).await?;
        tracing::debug!(
            counter_party_id = model.id,
            insert,
            updated,
            "Backfilled counterparty identity onto transactions"
        );
        Ok(model)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Copy the counterparty id, full name and DNI onto every transaction of the
/// same user and exchange that names this counterparty. Returns the number of
/// rows touched.
///
/// A merchant number always claims its rows. A nickname only claims rows
/// that carry no merchant number and are unlinked or already linked here.
pub async fn backfill_transactions<C>(db: &C, model: &Model) -> Result<u64, DbErr>
where
    C: ConnectionTrait,
{
    let by_nickname = Condition::all()
        .add(transactions::Column::CounterpartyNickname.eq(model.nickname.clone()))
        .add(transactions::Column::CounterpartyMerchantNo.is_null())
        .add(
            Condition::any()
                .add(transactions::Column::CounterPartyId.is_null())
                .add(transactions::Column::CounterPartyId.eq(model.id)),
        );
    let mut identity = Condition::any().add(by_nickname);
    if let Some(merchant_no) = non_empty(&model.merchant_no) {
        identity = identity.add(transactions::Column::CounterpartyMerchantNo.eq(merchant_no));
    }

    let mut update = transactions::Entity::update_many()
        .col_expr(transactions::Column::CounterPartyId, Expr::value(model.id))
        .col_expr(transactions::Column::UpdatedAt, Expr::value(Utc::now()));
    if let Some(full_name) = non_empty(&model.full_name) {
        update = update.col_expr(transactions::Column::CounterpartyFullName, Expr::value(full_name));
    }
    if let Some(dni) = non_empty(&model.dni) {
        update = update.col_expr(transactions::Column::CounterpartyDni, Expr::value(dni));
    }

    let result = update
        .filter(transactions::Column::UserId.eq(model.user_id))
        .filter(transactions::Column::Exchange.eq(model.exchange.clone()))
        .filter(identity)
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Resolve the counterparty of a transaction, creating it on first sight.
///
/// Lookup goes by merchant number first and falls back to the nickname. An
/// existing record gets a stale full name or DNI replaced by the values on
/// the transaction. Returns `None` when the transaction names nobody.
pub async fn find_or_create_for_transaction<C>(
    db: &C,
    tx: &transactions::Model,
) -> Result<Option<Model>, DbErr>
where
    C: ConnectionTrait,
{
    let merchant_no = non_empty(&tx.counterparty_merchant_no);
    let nickname = non_empty(&tx.counterparty_nickname);
    let full_name = non_empty(&tx.counterparty_full_name);
    let dni = non_empty(&tx.counterparty_dni);

    let identity = match nickname.or(merchant_no) {
        Some(identity) => identity,
        None => return Ok(None),
    };

    let scope = Entity::find()
        .filter(Column::UserId.eq(tx.user_id))
        .filter(Column::Exchange.eq(tx.exchange.clone()));

    let mut existing = None;
    if let Some(merchant_no) = merchant_no {
        existing = scope
            .clone()
            .filter(Column::MerchantNo.eq(merchant_no))
            .one(db)
            .await?;
    }
    if existing.is_none() {
        existing = scope.filter(Column::Nickname.eq(identity)).one(db).await?;
    }

    let now = Utc::now();
    let saved = match existing {
        Some(found) => {
            let last_seen = match found.last_seen_at {
                Some(seen) if seen > tx.transaction_date => seen,
                _ => tx.transaction_date,
            };
            let mut active: ActiveModel = found.clone().into();
            if let Some(full_name) = full_name {
                if found.full_name.as_deref() != Some(full_name) {
                    active.full_name = ActiveValue::Set(Some(full_name.to_string()));
                }
            }
            if let Some(dni) = dni {
                if found.dni.as_deref() != Some(dni) {
                    active.dni = ActiveValue::Set(Some(dni.to_string()));
                }
            }
            if found.merchant_no.is_none() {
                if let Some(merchant_no) = merchant_no {
                    active.merchant_no = ActiveValue::Set(Some(merchant_no.to_string()));
                }
            }
            active.last_seen_at = ActiveValue::Set(Some(last_seen));
            active.updated_at = ActiveValue::Set(Some(now));
            active.update(db).await?
        }
        None => {
            let active = ActiveModel {
                user_id: ActiveValue::Set(tx.user_id),
                exchange: ActiveValue::Set(tx.exchange.clone()),
                nickname: ActiveValue::Set(identity.to_string()),
                merchant_no: ActiveValue::Set(merchant_no.map(str::to_string)),
                full_name: ActiveValue::Set(full_name.map(str::to_string)),
                dni: ActiveValue::Set(dni.map(str::to_string)),
                first_seen_at: ActiveValue::Set(Some(tx.transaction_date)),
                last_seen_at: ActiveValue::Set(Some(tx.transaction_date)),
                created_at: ActiveValue::Set(Some(now)),
                updated_at: ActiveValue::Set(Some(now)),
                ..Default::default()
            };
            active.insert(db).await?
        }
    };

    Ok(Some(saved))
}
