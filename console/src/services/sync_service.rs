use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use shared::repositories::{
    ActiveCredentials, CredentialRepository, ExchangeCredential, TradeHistoryRepository,
    TransactionRepository, UpsertOutcome,
};
use shared::{CredentialCipher, Exchange};
use std::sync::Arc;
use crate::exchanges::{ExchangeRegistry, SyncWindow};

/// Outcome of syncing one credential.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub trades: usize,
}

/// Outcome of a sync across every user and exchange.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub synced: usize,
    pub failed: usize,
    pub skipped_exchanges: usize,
    pub totals: SyncReport,
}

impl SyncReport {
    fn absorb(&mut self, other: &SyncReport) {
        self.fetched += other.fetched;
        self.created += other.created;
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.trades += other.trades;
    }
}

pub struct SyncService {
    transactions: TransactionRepository,
    trades: TradeHistoryRepository,
    credentials: CredentialRepository,
    exchanges: ExchangeRegistry,
}

impl SyncService {
    pub fn new(db: Arc<DatabaseConnection>, cipher: CredentialCipher, exchanges: ExchangeRegistry) -> Self {
        Self {
            transactions: TransactionRepository::new(db.clone()),
            trades: TradeHistoryRepository::new(db.clone()),
            credentials: CredentialRepository::new(db, cipher),
            exchanges,
        }
    }

    pub async fn active_credentials(&self, exchange: Exchange, user_id: Option<i64>) -> Result<ActiveCredentials> {
        self.credentials.list_active(exchange, user_id).await
    }

    /// Pull one user's P2P history for `window` and reconcile it by order
    /// number.
    pub async fn sync_credential(&self, credential: &ExchangeCredential, window: &SyncWindow) -> Result<SyncReport> {
        let client = self
            .exchanges
            .get(credential.exchange)
            .with_context(|| format!("No history client for {}", credential.exchange))?;

        let remote = client
            .fetch_p2p_history(credential, window)
            .await
            .with_context(|| format!("Failed to fetch {} history for user {}", credential.exchange, credential.user_id))?;

        let mut report = SyncReport {
            fetched: remote.len(),
            ..Default::default()
        };
        for tx in &remote {
            let outcome = self.transactions.upsert(tx).await?;
            match &outcome {
                UpsertOutcome::Created(_) => report.created += 1,
                UpsertOutcome::Updated(_) => report.updated += 1,
                UpsertOutcome::Unchanged(_) => report.unchanged += 1,
            }
            if self.trades.upsert_from_transaction(outcome.model()).await?.is_some() {
                report.trades += 1;
            }
        }

        self.credentials
            .mark_synced(credential.exchange, credential.id, Utc::now())
            .await?;

        tracing::info!(
            user_id = credential.user_id,
            exchange = %credential.exchange,
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            "Synced P2P history"
        );
        Ok(report)
    }

    /// Sync the active credential of one user on one exchange.
    pub async fn sync_user(&self, user_id: i64, exchange: Exchange, window: &SyncWindow) -> Result<SyncReport> {
        let credential = self
            .credentials
            .find_active(exchange, user_id)
            .await?
            .with_context(|| format!("No active {} credentials for user {}", exchange, user_id))?;
        self.sync_credential(&credential, window).await
    }

    /// Sync every active credential of every exchange. A failing user or
    /// exchange is logged and counted; the rest of the batch still runs.
    pub async fn sync_all(&self, window: &SyncWindow) -> BatchReport {
        let mut batch = BatchReport::default();

        for exchange in Exchange::ALL.iter().copied() {
            if self.exchanges.get(exchange).is_none() {
                tracing::debug!(exchange = %exchange, "No history client, skipping exchange");
                batch.skipped_exchanges += 1;
                continue;
            }

            let active = match self.credentials.list_active(exchange, None).await {
                Ok(active) => active,
                Err(e) => {
                    let error = format!("{:#}", e);
                    tracing::error!(exchange = %exchange, error = %error, "Failed to load credentials");
                    batch.failed += 1;
                    continue;
                }
            };

            batch.failed += active.unreadable.len();

            for credential in &active.usable {
                match self.sync_credential(credential, window).await {
                    Ok(report) => {
                        batch.synced += 1;
                        batch.totals.absorb(&report);
                    }
                    Err(e) => {
                        let error = format!("{:#}", e);
                        tracing::error!(
                            user_id = credential.user_id,
                            exchange = %exchange,
                            error = %error,
                            "Transaction sync failed"
                        );
                        batch.failed += 1;
                    }
                }
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::fakes::FakeExchangeClient;
    use rust_decimal::Decimal;
    use shared::repositories::{NewTransaction, TransactionFilter};
    use shared::testing::{at, create_user, setup_db};
    use shared::TransactionType;

    fn remote(user_id: i64, exchange: Exchange, order_number: &str) -> NewTransaction {
        NewTransaction {
            user_id,
            exchange,
            order_number: order_number.to_string(),
            transaction_type: TransactionType::P2pSell,
            asset: "USDT".to_string(),
            fiat: Some("PEN".to_string()),
            price: Decimal::new(375, 2),
            quantity: Decimal::new(10, 0),
            total_price: Decimal::new(375, 1),
            fee: Decimal::ZERO,
            fee_asset: None,
            status: "completed".to_string(),
            payment_method: None,
            counterparty_nickname: Some("bob".to_string()),
            counterparty_merchant_no: None,
            counterparty_full_name: None,
            counterparty_dni: None,
            raw_data: None,
            transaction_date: at(4, 12),
        }
    }

    #[tokio::test]
    async fn test_failing_user_does_not_abort_batch() {
        let db = setup_db().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let carol = create_user(&db, "carol").await;
        let db = Arc::new(db);
        let cipher = CredentialCipher::new("test-key").unwrap();
        let credentials = CredentialRepository::new(db.clone(), cipher.clone());
        for user in [&alice, &bob] {
            credentials.upsert(Exchange::Binance, user.id, "k", "s", None).await.unwrap();
        }
        credentials.upsert(Exchange::Bybit, carol.id, "k", "s", None).await.unwrap();
        credentials.upsert(Exchange::Okx, carol.id, "k", "s", Some("p")).await.unwrap();

        let mut binance = FakeExchangeClient::new(Exchange::Binance);
        binance.failing.insert(alice.id);
        binance.history.insert(bob.id, vec![remote(bob.id, Exchange::Binance, "BN-1")]);
        let mut bybit = FakeExchangeClient::new(Exchange::Bybit);
        bybit.history.insert(
            carol.id,
            vec![remote(carol.id, Exchange::Bybit, "BY-1"), remote(carol.id, Exchange::Bybit, "BY-2")],
        );
        let registry = ExchangeRegistry::new()
            .register(Arc::new(binance))
            .register(Arc::new(bybit));

        let service = SyncService::new(db.clone(), cipher, registry);
        let window = SyncWindow::new(at(4, 0), at(5, 0));
        let batch = service.sync_all(&window).await;

        assert_eq!(batch.failed, 1);
        assert_eq!(batch.synced, 2);
        assert_eq!(batch.skipped_exchanges, 1);
        assert_eq!(batch.totals.created, 3);
        assert_eq!(batch.totals.trades, 3);

        let bob_synced = credentials.find_active(Exchange::Binance, bob.id).await.unwrap().unwrap();
        assert!(bob_synced.last_synced_at.is_some());
        let alice_synced = credentials.find_active(Exchange::Binance, alice.id).await.unwrap().unwrap();
        assert!(alice_synced.last_synced_at.is_none());
    }

    #[tokio::test]
    async fn test_undecryptable_credential_does_not_block_exchange() {
        let db = setup_db().await;
        let alice = create_user(&db, "alice").await;
        let bob = create_user(&db, "bob").await;
        let db = Arc::new(db);
        let cipher = CredentialCipher::new("test-key").unwrap();
        CredentialRepository::new(db.clone(), cipher.clone())
            .upsert(Exchange::Binance, alice.id, "k", "s", None)
            .await
            .unwrap();
        CredentialRepository::new(db.clone(), CredentialCipher::new("old-key").unwrap())
            .upsert(Exchange::Binance, bob.id, "k", "s", None)
            .await
            .unwrap();

        let mut binance = FakeExchangeClient::new(Exchange::Binance);
        binance.history.insert(alice.id, vec![remote(alice.id, Exchange::Binance, "BN-3")]);
        let service = SyncService::new(db.clone(), cipher, ExchangeRegistry::new().register(Arc::new(binance)));
        let batch = service.sync_all(&SyncWindow::new(at(4, 0), at(5, 0))).await;

        assert_eq!(batch.synced, 1);
        assert_eq!(batch.failed, 1);
        assert_eq!(batch.totals.created, 1);
        assert_eq!(TransactionRepository::new(db).count_for_user(alice.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_resync_is_idempotent() {
        let db = setup_db().await;
        let alice = create_user(&db, "alice").await;
        let db = Arc::new(db);
        let cipher = CredentialCipher::new("test-key").unwrap();
        CredentialRepository::new(db.clone(), cipher.clone())
            .upsert(Exchange::Binance, alice.id, "k", "s", None)
            .await
            .unwrap();

        let mut binance = FakeExchangeClient::new(Exchange::Binance);
        binance.history.insert(
            alice.id,
            vec![remote(alice.id, Exchange::Binance, "BN-7"), remote(alice.id, Exchange::Binance, "BN-8")],
        );
        let service = SyncService::new(db.clone(), cipher, ExchangeRegistry::new().register(Arc::new(binance)));
        let window = SyncWindow::new(at(4, 0), at(5, 0));

        let first = service.sync_user(alice.id, Exchange::Binance, &window).await.unwrap();
        let second = service.sync_user(alice.id, Exchange::Binance, &window).await.unwrap();
        assert_eq!(first.created, 2);
        assert_eq!(second.created, 0);
        assert_eq!(second.unchanged, 2);

        let stored = TransactionRepository::new(db.clone())
            .list(&TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(stored.len(), 2);
    }

    #[tokio::test]
    async fn test_sync_user_without_credentials() {
        let db = Arc::new(setup_db().await);
        let service = SyncService::new(
            db,
            CredentialCipher::new("test-key").unwrap(),
            ExchangeRegistry::new().register(Arc::new(FakeExchangeClient::new(Exchange::Binance))),
        );
        let window = SyncWindow::new(at(4, 0), at(5, 0));
        let err = service.sync_user(1, Exchange::Binance, &window).await.unwrap_err();
        assert!(err.to_string().contains("No active binance credentials"));
    }
}
