use anyhow::Result;
use sea_orm::prelude::*;
use sea_orm::QueryOrder;
use std::sync::Arc;
use crate::entity::{counter_parties, transactions};

pub struct CounterPartyRepository {
    db: Arc<DatabaseConnection>,
}

impl CounterPartyRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list_for_user(&self, user_id: i64) -> Result<Vec<counter_parties::Model>> {
        let parties = counter_parties::Entity::find()
            .filter(counter_parties::Column::UserId.eq(user_id))
            .order_by_desc(counter_parties::Column::LastSeenAt)
            .all(self.db.as_ref())
            .await?;
        Ok(parties)
    }

    pub async fn find_or_create_for_transaction(
        &self,
        tx: &transactions::Model,
    ) -> Result<Option<counter_parties::Model>> {
        let party = counter_parties::find_or_create_for_transaction(self.db.as_ref(), tx).await?;
        Ok(party)
    }

    pub async fn transaction_count(&self, counter_party_id: i64) -> Result<u64> {
        let count = transactions::Entity::find()
            .filter(transactions::Column::CounterPartyId.eq(counter_party_id))
            .count(self.db.as_ref())
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Exchange, TransactionType};
    use crate::repositories::{NewTransaction, TransactionRepository};
    use crate::testing::{at, create_user, setup_db};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use sea_orm::{ActiveModelTrait, ActiveValue};

    fn trade(
        user_id: i64,
        order_number: &str,
        nickname: Option<&str>,
        merchant_no: Option<&str>,
        full_name: Option<&str>,
        dni: Option<&str>,
    ) -> NewTransaction {
        NewTransaction {
            user_id,
            exchange: Exchange::Binance,
            order_number: order_number.to_string(),
            transaction_type: TransactionType::P2pBuy,
            asset: "USDT".to_string(),
            fiat: Some("PEN".to_string()),
            price: Decimal::new(375, 2),
            quantity: Decimal::new(10, 0),
            total_price: Decimal::new(375, 1),
            fee: Decimal::ZERO,
            fee_asset: None,
            status: "completed".to_string(),
            payment_method: None,
            counterparty_nickname: nickname.map(str::to_string),
            counterparty_merchant_no: merchant_no.map(str::to_string),
            counterparty_full_name: full_name.map(str::to_string),
            counterparty_dni: dni.map(str::to_string),
            raw_data: None,
            transaction_date: at(5, 9),
        }
    }

    async fn insert_party(
        db: &DatabaseConnection,
        user_id: i64,
        nickname: &str,
        merchant_no: Option<&str>,
    ) -> counter_parties::Model {
        counter_parties::ActiveModel {
            user_id: ActiveValue::Set(user_id),
            exchange: ActiveValue::Set("binance".to_string()),
            nickname: ActiveValue::Set(nickname.to_string()),
            merchant_no: ActiveValue::Set(merchant_no.map(str::to_string)),
            full_name: ActiveValue::Set(Some("Old Name".to_string())),
            dni: ActiveValue::Set(Some("00000000".to_string())),
            first_seen_at: ActiveValue::Set(Some(at(1, 0))),
            last_seen_at: ActiveValue::Set(Some(at(1, 0))),
            created_at: ActiveValue::Set(Some(Utc::now())),
            updated_at: ActiveValue::Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(db)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_matches_merchant_before_nickname() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let by_merchant = insert_party(&db, user.id, "renamed", Some("M-1")).await;
        let by_nickname = insert_party(&db, user.id, "bob", None).await;
        let db = Arc::new(db);
        let txs = TransactionRepository::new(db.clone());
        let repo = CounterPartyRepository::new(db.clone());

        let tx = txs
            .upsert(&trade(user.id, "A-1", Some("bob"), Some("M-1"), None, None))
            .await
            .unwrap();
        let party = repo
            .find_or_create_for_transaction(tx.model())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(party.id, by_merchant.id);
        assert_ne!(party.id, by_nickname.id);
    }

    #[tokio::test]
    async fn test_falls_back_to_nickname_and_updates_stale_identity() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let existing = insert_party(&db, user.id, "bob", None).await;
        let db = Arc::new(db);
        let txs = TransactionRepository::new(db.clone());
        let repo = CounterPartyRepository::new(db.clone());

        let tx = txs
            .upsert(&trade(user.id, "A-2", Some("bob"), Some("M-9"), Some("Bob Perez"), Some("12345678")))
            .await
            .unwrap();
        let party = repo
            .find_or_create_for_transaction(tx.model())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(party.id, existing.id);
        assert_eq!(party.full_name.as_deref(), Some("Bob Perez"));
        assert_eq!(party.dni.as_deref(), Some("12345678"));
        assert_eq!(party.merchant_no.as_deref(), Some("M-9"));
        assert_eq!(party.last_seen_at, Some(at(5, 9)));
    }

    #[tokio::test]
    async fn test_creates_party_and_backfills_transactions() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let db = Arc::new(db);
        let txs = TransactionRepository::new(db.clone());
        let repo = CounterPartyRepository::new(db.clone());

        let first = txs
            .upsert(&trade(user.id, "A-3", Some("carol"), None, Some("Carol Diaz"), Some("87654321")))
            .await
            .unwrap();
        txs.upsert(&trade(user.id, "A-4", Some("carol"), None, None, None))
            .await
            .unwrap();
        txs.upsert(&trade(user.id, "A-5", Some("dave"), None, None, None))
            .await
            .unwrap();

        let party = repo
            .find_or_create_for_transaction(first.model())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(party.nickname, "carol");
        assert_eq!(repo.transaction_count(party.id).await.unwrap(), 2);

        let backfilled = txs.find_by_order_number("A-4").await.unwrap().unwrap();
        assert_eq!(backfilled.counter_party_id, Some(party.id));
        assert_eq!(backfilled.counterparty_full_name.as_deref(), Some("Carol Diaz"));
        assert_eq!(backfilled.counterparty_dni.as_deref(), Some("87654321"));

        let untouched = txs.find_by_order_number("A-5").await.unwrap().unwrap();
        assert_eq!(untouched.counter_party_id, None);
    }

    #[tokio::test]
    async fn test_nickname_party_does_not_steal_merchant_matched_rows() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let db = Arc::new(db);
        let txs = TransactionRepository::new(db.clone());
        let repo = CounterPartyRepository::new(db.clone());

        let t0 = txs
            .upsert(&trade(user.id, "T-0", Some("maria"), Some("M-1"), Some("Maria Real"), None))
            .await
            .unwrap();
        let t1 = txs
            .upsert(&trade(user.id, "T-1", Some("bob"), Some("M-1"), None, None))
            .await
            .unwrap();
        let t2 = txs
            .upsert(&trade(user.id, "T-2", Some("bob"), None, Some("Other Bob"), None))
            .await
            .unwrap();

        let merchant = repo.find_or_create_for_transaction(t0.model()).await.unwrap().unwrap();
        let matched = repo.find_or_create_for_transaction(t1.model()).await.unwrap().unwrap();
        assert_eq!(matched.id, merchant.id);
        let nickname = repo.find_or_create_for_transaction(t2.model()).await.unwrap().unwrap();
        assert_ne!(nickname.id, merchant.id);

        let t1 = txs.find_by_order_number("T-1").await.unwrap().unwrap();
        assert_eq!(t1.counter_party_id, Some(merchant.id));
        assert_eq!(t1.counterparty_full_name.as_deref(), Some("Maria Real"));
        let t2 = txs.find_by_order_number("T-2").await.unwrap().unwrap();
        assert_eq!(t2.counter_party_id, Some(nickname.id));
        assert_eq!(repo.transaction_count(merchant.id).await.unwrap(), 2);
        assert_eq!(repo.transaction_count(nickname.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_nickname_falls_back_to_merchant_number() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let db = Arc::new(db);
        let txs = TransactionRepository::new(db.clone());
        let repo = CounterPartyRepository::new(db.clone());

        let tx = txs
            .upsert(&trade(user.id, "A-6", None, Some("M-42"), None, None))
            .await
            .unwrap();
        let party = repo
            .find_or_create_for_transaction(tx.model())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(party.nickname, "M-42");
        assert_eq!(party.merchant_no.as_deref(), Some("M-42"));
    }

    #[tokio::test]
    async fn test_no_identity_returns_none() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let db = Arc::new(db);
        let txs = TransactionRepository::new(db.clone());
        let repo = CounterPartyRepository::new(db.clone());

        let tx = txs
            .upsert(&trade(user.id, "A-7", None, None, None, None))
            .await
            .unwrap();
        assert!(repo.find_or_create_for_transaction(tx.model()).await.unwrap().is_none());
        assert!(repo.list_for_user(user.id).await.unwrap().is_empty());
    }
}
