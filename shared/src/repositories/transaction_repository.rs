use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect,
};
use serde_json::Value;
use std::sync::Arc;
use crate::entity::transactions;
use crate::models::{EnrichmentStatus, Exchange, TransactionType};

/// Attempts after which a failed enrichment is not retried.
pub const MAX_ENRICHMENT_ATTEMPTS: i32 = 3;

/// A transaction as reported by an exchange, before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub user_id: i64,
    pub exchange: Exchange,
    pub order_number: String,
    pub transaction_type: TransactionType,
    pub asset: String,
    pub fiat: Option<String>,
    pub price: Decimal,
    pub quantity: Decimal,
    pub total_price: Decimal,
    pub fee: Decimal,
    pub fee_asset: Option<String>,
    pub status: String,
    pub payment_method: Option<String>,
    pub counterparty_nickname: Option<String>,
    pub counterparty_merchant_no: Option<String>,
    pub counterparty_full_name: Option<String>,
    pub counterparty_dni: Option<String>,
    pub raw_data: Option<Value>,
    pub transaction_date: DateTime<Utc>,
}

impl NewTransaction {
    fn has_counterparty_identity(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);
        present(&self.counterparty_nickname) || present(&self.counterparty_merchant_no)
    }

    fn initial_enrichment_status(&self) -> EnrichmentStatus {
        if self.transaction_type.is_p2p() && self.has_counterparty_identity() {
            EnrichmentStatus::Pending
        } else {
            EnrichmentStatus::Skipped
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Created(transactions::Model),
    Updated(transactions::Model),
    Unchanged(transactions::Model),
}

impl UpsertOutcome {
    pub fn model(&self) -> &transactions::Model {
        match self {
            UpsertOutcome::Created(m) | UpsertOutcome::Updated(m) | UpsertOutcome::Unchanged(m) => m,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub user_id: Option<i64>,
    pub exchange: Option<Exchange>,
    pub transaction_type: Option<TransactionType>,
    pub p2p_only: bool,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<u64>,
}

pub struct TransactionRepository {
    db: Arc<DatabaseConnection>,
}

impl TransactionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<transactions::Model>> {
        let tx = transactions::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;
        Ok(tx)
    }

    pub async fn find_by_order_number(&self, order_number: &str) -> Result<Option<transactions::Model>> {
        let tx = transactions::Entity::find_by_order_number(order_number)
            .one(self.db.as_ref())
            .await?;
        Ok(tx)
    }

    /// Insert the transaction or refresh the exchange-owned fields of the row
    /// with the same order number. Enrichment state is never reset here.
    pub async fn upsert(&self, new: &NewTransaction) -> Result<UpsertOutcome> {
        let now = Utc::now();
        let existing = self
            .find_by_order_number(&new.order_number)
            .await
            .with_context(|| format!("Failed to look up order {}", new.order_number))?;

        match existing {
            Some(existing) => {
                let changed = existing.status != new.status
                    || existing.price != new.price
                    || existing.quantity != new.quantity
                    || existing.total_price != new.total_price
                    || existing.fee != new.fee;
                let missing_identity =
                    !existing.has_counterparty_identity() && new.has_counterparty_identity();
                if !changed && !missing_identity {
                    return Ok(UpsertOutcome::Unchanged(existing));
                }

                let mut active: transactions::ActiveModel = existing.clone().into();
                active.status = ActiveValue::Set(new.status.clone());
                active.price = ActiveValue::Set(new.price);
                active.quantity = ActiveValue::Set(new.quantity);
                active.total_price = ActiveValue::Set(new.total_price);
                active.fee = ActiveValue::Set(new.fee);
                if new.fee_asset.is_some() {
                    active.fee_asset = ActiveValue::Set(new.fee_asset.clone());
                }
                if new.raw_data.is_some() {
                    active.raw_data = ActiveValue::Set(new.raw_data.clone());
                }
                if missing_identity {
                    active.counterparty_nickname = ActiveValue::Set(new.counterparty_nickname.clone());
                    active.counterparty_merchant_no = ActiveValue::Set(new.counterparty_merchant_no.clone());
                    if existing.enrichment_status == EnrichmentStatus::Skipped.as_str() {
                        active.enrichment_status = ActiveValue::Set(new.initial_enrichment_status().to_string());
                    }
                }
                active.updated_at = ActiveValue::Set(Some(now));
                let updated = active.update(self.db.as_ref()).await?;
                Ok(UpsertOutcome::Updated(updated))
            }
            None => {
                let active = transactions::ActiveModel {
                    user_id: ActiveValue::Set(new.user_id),
                    exchange: ActiveValue::Set(new.exchange.to_string()),
                    order_number: ActiveValue::Set(new.order_number.clone()),
                    transaction_type: ActiveValue::Set(new.transaction_type.to_string()),
                    asset: ActiveValue::Set(new.asset.clone()),
                    fiat: ActiveValue::Set(new.fiat.clone()),
                    price: ActiveValue::Set(new.price),
                    quantity: ActiveValue::Set(new.quantity),
                    total_price: ActiveValue::Set(new.total_price),
                    fee: ActiveValue::Set(new.fee),
                    fee_asset: ActiveValue::Set(new.fee_asset.clone()),
                    status: ActiveValue::Set(new.status.clone()),
                    payment_method: ActiveValue::Set(new.payment_method.clone()),
                    counterparty_nickname: ActiveValue::Set(new.counterparty_nickname.clone()),
                    counterparty_merchant_no: ActiveValue::Set(new.counterparty_merchant_no.clone()),
                    counterparty_full_name: ActiveValue::Set(new.counterparty_full_name.clone()),
                    counterparty_dni: ActiveValue::Set(new.counterparty_dni.clone()),
                    counter_party_id: ActiveValue::Set(None),
                    enrichment_status: ActiveValue::Set(new.initial_enrichment_status().to_string()),
                    enrichment_attempts: ActiveValue::Set(0),
                    enriched_at: ActiveValue::Set(None),
                    enrichment_error: ActiveValue::Set(None),
                    raw_data: ActiveValue::Set(new.raw_data.clone()),
                    transaction_date: ActiveValue::Set(new.transaction_date),
                    created_at: ActiveValue::Set(Some(now)),
                    updated_at: ActiveValue::Set(Some(now)),
                    ..Default::default()
                };
                let created = active.insert(self.db.as_ref()).await?;
                Ok(UpsertOutcome::Created(created))
            }
        }
    }

    pub async fn list(&self, filter: &TransactionFilter) -> Result<Vec<transactions::Model>> {
        let mut query = match (filter.from, filter.to) {
            (Some(from), Some(to)) => transactions::Entity::find_between(from, to),
            (Some(from), None) => transactions::Entity::find().filter(transactions::Column::TransactionDate.gte(from)),
            (None, Some(to)) => transactions::Entity::find().filter(transactions::Column::TransactionDate.lte(to)),
            (None, None) => transactions::Entity::find(),
        };
        if filter.p2p_only {
            query = query.filter(transactions::Entity::p2p_condition());
        }
        if let Some(user_id) = filter.user_id {
            query = query.filter(transactions::Column::UserId.eq(user_id));
        }
        if let Some(exchange) = filter.exchange {
            query = query.filter(transactions::Column::Exchange.eq(exchange.as_str()));
        }
        if let Some(transaction_type) = filter.transaction_type {
            query = query.filter(transactions::Column::TransactionType.eq(transaction_type.as_str()));
        }
        query = query
            .order_by_desc(transactions::Column::TransactionDate)
            .order_by_desc(transactions::Column::Id);
        if let Some(limit) = filter.limit {
            query = query.limit(limit);
        }
        Ok(query.all(self.db.as_ref()).await?)
    }

    pub async fn count_by_enrichment_status(&self) -> Result<Vec<(EnrichmentStatus, u64)>> {
        let mut counts = Vec::with_capacity(EnrichmentStatus::ALL.len());
        for status in EnrichmentStatus::ALL {
            let count = transactions::Entity::find()
                .filter(transactions::Column::EnrichmentStatus.eq(status.as_str()))
                .count(self.db.as_ref())
                .await?;
            counts.push((*status, count));
        }
        Ok(counts)
    }

    pub async fn count_for_user(&self, user_id: i64) -> Result<u64> {
        let count = transactions::Entity::find()
            .filter(transactions::Column::UserId.eq(user_id))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }

    /// Sum of `total_price` for one user and transaction type.
    pub async fn volume(&self, user_id: i64, transaction_type: TransactionType) -> Result<Decimal> {
        let total: Option<Option<Decimal>> = transactions::Entity::find()
            .select_only()
            .column_as(transactions::Column::TotalPrice.sum(), "total")
            .filter(transactions::Column::UserId.eq(user_id))
            .filter(transactions::Column::TransactionType.eq(transaction_type.as_str()))
            .into_tuple()
            .one(self.db.as_ref())
            .await?;
        Ok(total.flatten().unwrap_or(Decimal::ZERO))
    }

    pub async fn pending_enrichment(&self, limit: u64) -> Result<Vec<transactions::Model>> {
        let pending = transactions::Entity::find_pending_enrichment()
            .limit(limit)
            .all(self.db.as_ref())
            .await?;
        Ok(pending)
    }

    /// Claim a pending row. Returns false when another worker got it first.
    pub async fn mark_processing(&self, id: i64) -> Result<bool> {
        let result = transactions::Entity::update_many()
            .col_expr(
                transactions::Column::EnrichmentStatus,
                sea_orm::sea_query::Expr::value(EnrichmentStatus::Processing.as_str()),
            )
            .col_expr(
                transactions::Column::EnrichmentAttempts,
                sea_orm::sea_query::Expr::col(transactions::Column::EnrichmentAttempts).add(1),
            )
            .col_expr(transactions::Column::UpdatedAt, sea_orm::sea_query::Expr::value(Utc::now()))
            .filter(transactions::Column::Id.eq(id))
            .filter(transactions::Column::EnrichmentStatus.eq(EnrichmentStatus::Pending.as_str()))
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected == 1)
    }

    pub async fn mark_enriched(&self, id: i64, counter_party_id: i64) -> Result<()> {
        self.set_enrichment(id, EnrichmentStatus::Completed, Some(counter_party_id), None)
            .await
    }

    pub async fn mark_skipped(&self, id: i64, reason: &str) -> Result<()> {
        self.set_enrichment(id, EnrichmentStatus::Skipped, None, Some(reason.to_string()))
            .await
    }

    /// Record a failure. The row goes back to `pending` until it has used up
    /// its attempts, then stays `failed`.
    pub async fn mark_failed(&self, id: i64, error: &str) -> Result<EnrichmentStatus> {
        let tx = self
            .find_by_id(id)
            .await?
            .with_context(|| format!("Transaction {} not found", id))?;
        let status = if tx.enrichment_attempts >= MAX_ENRICHMENT_ATTEMPTS {
            EnrichmentStatus::Failed
        } else {
            EnrichmentStatus::Pending
        };
        self.set_enrichment(id, status, None, Some(error.to_string())).await?;
        Ok(status)
    }

    /// Put `failed` rows back in the queue with a fresh attempt budget, along
    /// with rows claimed before `stuck_before` that never left `processing`.
    pub async fn retry_failed(&self, stuck_before: DateTime<Utc>) -> Result<u64> {
        let stuck = Condition::all()
            .add(transactions::Column::EnrichmentStatus.eq(EnrichmentStatus::Processing.as_str()))
            .add(
                Condition::any()
                    .add(transactions::Column::UpdatedAt.lt(stuck_before))
                    .add(transactions::Column::UpdatedAt.is_null()),
            );
        let result = transactions::Entity::update_many()
            .col_expr(
                transactions::Column::EnrichmentStatus,
                sea_orm::sea_query::Expr::value(EnrichmentStatus::Pending.as_str()),
            )
            .col_expr(
                transactions::Column::EnrichmentAttempts,
                sea_orm::sea_query::Expr::value(0),
            )
            .filter(
                Condition::any()
                    .add(transactions::Column::EnrichmentStatus.eq(EnrichmentStatus::Failed.as_str()))
                    .add(stuck),
            )
            .exec(self.db.as_ref())
            .await?;
        Ok(result.rows_affected)
    }

    async fn set_enrichment(
        &self,
        id: i64,
        status: EnrichmentStatus,
        counter_party_id: Option<i64>,
        error: Option<String>,
    ) -> Result<()> {
        let now = Utc::now();
        let mut active = transactions::ActiveModel {
            id: ActiveValue::Unchanged(id),
            enrichment_status: ActiveValue::Set(status.to_string()),
            enrichment_error: ActiveValue::Set(error),
            updated_at: ActiveValue::Set(Some(now)),
            ..Default::default()
        };
        if status == EnrichmentStatus::Completed {
            active.enriched_at = ActiveValue::Set(Some(now));
        }
        if let Some(counter_party_id) = counter_party_id {
            active.counter_party_id = ActiveValue::Set(Some(counter_party_id));
        }
        active.update(self.db.as_ref()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, create_user, setup_db};

    fn p2p_sell(user_id: i64, order_number: &str, nickname: Option<&str>) -> NewTransaction {
        NewTransaction {
            user_id,
            exchange: Exchange::Binance,
            order_number: order_number.to_string(),
            transaction_type: TransactionType::P2pSell,
            asset: "USDT".to_string(),
            fiat: Some("PEN".to_string()),
            price: Decimal::new(375, 2),
            quantity: Decimal::new(100, 0),
            total_price: Decimal::new(375, 0),
            fee: Decimal::ZERO,
            fee_asset: None,
            status: "completed".to_string(),
            payment_method: Some("BCP".to_string()),
            counterparty_nickname: nickname.map(str::to_string),
            counterparty_merchant_no: None,
            counterparty_full_name: None,
            counterparty_dni: None,
            raw_data: None,
            transaction_date: at(10, 12),
        }
    }

    #[tokio::test]
    async fn test_order_number_is_unique() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let repo = TransactionRepository::new(Arc::new(db));

        let first = repo.upsert(&p2p_sell(user.id, "ORD-1", Some("bob"))).await.unwrap();
        assert!(matches!(first, UpsertOutcome::Created(_)));

        // A raw insert bypassing the upsert must hit the unique index.
        let mut duplicate: transactions::ActiveModel = first.model().clone().into();
        duplicate.id = ActiveValue::NotSet;
        let err = transactions::Entity::insert(duplicate)
            .exec(repo.db.as_ref())
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let repo = TransactionRepository::new(Arc::new(db));
        let tx = p2p_sell(user.id, "ORD-2", Some("bob"));

        assert!(matches!(repo.upsert(&tx).await.unwrap(), UpsertOutcome::Created(_)));
        assert!(matches!(repo.upsert(&tx).await.unwrap(), UpsertOutcome::Unchanged(_)));

        let mut cancelled = tx.clone();
        cancelled.status = "cancelled".to_string();
        match repo.upsert(&cancelled).await.unwrap() {
            UpsertOutcome::Updated(model) => assert_eq!(model.status, "cancelled"),
            other => panic!("expected update, got {:?}", other),
        }

        let all = repo.list(&TransactionFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn test_update_keeps_enrichment_state() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let repo = TransactionRepository::new(Arc::new(db));
        let tx = p2p_sell(user.id, "ORD-3", Some("bob"));

        let created = repo.upsert(&tx).await.unwrap();
        repo.mark_skipped(created.model().id, "manual").await.unwrap();

        let mut changed = tx.clone();
        changed.fee = Decimal::new(5, 1);
        let updated = repo.upsert(&changed).await.unwrap();
        assert_eq!(updated.model().enrichment_status, "skipped");
        assert_eq!(updated.model().fee, Decimal::new(5, 1));
    }

    #[tokio::test]
    async fn test_initial_enrichment_status() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let repo = TransactionRepository::new(Arc::new(db));

        let with_nickname = repo.upsert(&p2p_sell(user.id, "ORD-4", Some("bob"))).await.unwrap();
        assert_eq!(with_nickname.model().enrichment_status, "pending");

        let anonymous = repo.upsert(&p2p_sell(user.id, "ORD-5", None)).await.unwrap();
        assert_eq!(anonymous.model().enrichment_status, "skipped");

        let mut deposit = p2p_sell(user.id, "ORD-6", Some("bob"));
        deposit.transaction_type = TransactionType::Deposit;
        let deposit = repo.upsert(&deposit).await.unwrap();
        assert_eq!(deposit.model().enrichment_status, "skipped");
    }

    #[tokio::test]
    async fn test_failed_enrichment_retries_until_budget_is_spent() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let repo = TransactionRepository::new(Arc::new(db));
        let id = repo
            .upsert(&p2p_sell(user.id, "ORD-7", Some("bob")))
            .await
            .unwrap()
            .model()
            .id;

        for attempt in 1..=MAX_ENRICHMENT_ATTEMPTS {
            assert!(repo.mark_processing(id).await.unwrap());
            let status = repo.mark_failed(id, "boom").await.unwrap();
            if attempt < MAX_ENRICHMENT_ATTEMPTS {
                assert_eq!(status, EnrichmentStatus::Pending);
            } else {
                assert_eq!(status, EnrichmentStatus::Failed);
            }
        }
        assert!(!repo.mark_processing(id).await.unwrap());

        let counts = repo.count_by_enrichment_status().await.unwrap();
        assert!(counts.contains(&(EnrichmentStatus::Failed, 1)));

        assert_eq!(repo.retry_failed(Utc::now()).await.unwrap(), 1);
        assert_eq!(repo.pending_enrichment(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_picks_up_stuck_processing_rows() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let repo = TransactionRepository::new(Arc::new(db));
        let id = repo
            .upsert(&p2p_sell(user.id, "ORD-10", Some("bob")))
            .await
            .unwrap()
            .model()
            .id;
        assert!(repo.mark_processing(id).await.unwrap());

        let claimed_at = Utc::now();
        assert_eq!(repo.retry_failed(claimed_at - chrono::Duration::minutes(15)).await.unwrap(), 0);
        assert_eq!(repo.retry_failed(claimed_at + chrono::Duration::seconds(1)).await.unwrap(), 1);

        let row = repo.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(row.enrichment_status, "pending");
        assert_eq!(row.enrichment_attempts, 0);
    }

    #[tokio::test]
    async fn test_volume_and_filters() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let repo = TransactionRepository::new(Arc::new(db));
        repo.upsert(&p2p_sell(user.id, "ORD-8", Some("bob"))).await.unwrap();
        repo.upsert(&p2p_sell(user.id, "ORD-9", Some("bob"))).await.unwrap();
        let mut buy = p2p_sell(user.id, "ORD-10", Some("carol"));
        buy.transaction_type = TransactionType::P2pBuy;
        repo.upsert(&buy).await.unwrap();

        assert_eq!(
            repo.volume(user.id, TransactionType::P2pSell).await.unwrap(),
            Decimal::new(750, 0)
        );
        assert_eq!(
            repo.volume(user.id, TransactionType::Deposit).await.unwrap(),
            Decimal::ZERO
        );

        let buys = repo
            .list(&TransactionFilter {
                transaction_type: Some(TransactionType::P2pBuy),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(buys.len(), 1);
        assert_eq!(buys[0].order_number, "ORD-10");
        assert!(buys[0].is_p2p());

        let mut deposit = p2p_sell(user.id, "DEP-1", None);
        deposit.transaction_type = TransactionType::Deposit;
        deposit.transaction_date = at(20, 12);
        repo.upsert(&deposit).await.unwrap();

        let p2p = repo
            .list(&TransactionFilter { p2p_only: true, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(p2p.len(), 3);

        let late = repo
            .list(&TransactionFilter {
                from: Some(at(15, 0)),
                to: Some(at(25, 0)),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].order_number, "DEP-1");
    }
}
