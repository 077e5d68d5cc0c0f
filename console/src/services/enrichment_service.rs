use anyhow::Result;
use chrono::Utc;
use sea_orm::DatabaseConnection;
use shared::entity::transactions;
use shared::repositories::{CounterPartyRepository, TradeHistoryRepository, TransactionRepository};
use shared::EnrichmentStatus;
use std::sync::Arc;

/// Minutes after which a claimed row still in `processing` counts as stuck.
pub const STUCK_AFTER_MINUTES: i64 = 15;

enum Outcome {
    Completed,
    Skipped,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub processed: usize,
    pub completed: usize,
    pub skipped: usize,
    /// Failures that will be retried.
    pub retrying: usize,
    /// Failures that used up their attempts.
    pub failed: usize,
}

/// Resolves counterparties for pending P2P transactions.
pub struct EnrichmentService {
    transactions: TransactionRepository,
    counter_parties: CounterPartyRepository,
    trades: TradeHistoryRepository,
}

impl EnrichmentService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            transactions: TransactionRepository::new(db.clone()),
            counter_parties: CounterPartyRepository::new(db.clone()),
            trades: TradeHistoryRepository::new(db),
        }
    }

    pub async fn status_counts(&self) -> Result<Vec<(EnrichmentStatus, u64)>> {
        self.transactions.count_by_enrichment_status().await
    }

    /// Move failed transactions back to pending with a fresh attempt budget.
    /// Rows left in `processing` for longer than `STUCK_AFTER_MINUTES` go
    /// back too.
    pub async fn retry_failed(&self) -> Result<u64> {
        let stuck_before = Utc::now() - chrono::Duration::minutes(STUCK_AFTER_MINUTES);
        let count = self.transactions.retry_failed(stuck_before).await?;
        tracing::info!(count, "Failed enrichments re-queued");
        Ok(count)
    }

    /// Enrich up to `batch_size` pending transactions, oldest first. Once a
    /// row is claimed any error is recorded on that row and the batch goes on.
    pub async fn process_batch(&self, batch_size: u64) -> Result<EnrichmentReport> {
        let mut report = EnrichmentReport::default();
        let pending = self.transactions.pending_enrichment(batch_size).await?;

        for tx in pending {
            if !self.transactions.mark_processing(tx.id).await? {
                continue;
            }
            report.processed += 1;

            match self.enrich(&tx).await {
                Ok(Outcome::Completed) => report.completed += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    let message = format!("{:#}", e);
                    tracing::warn!(order_number = %tx.order_number, error = %message, "Enrichment failed");
                    match self.transactions.mark_failed(tx.id, &message).await {
                        Ok(EnrichmentStatus::Failed) => report.failed += 1,
                        Ok(_) => report.retrying += 1,
                        Err(e) => {
                            // Still `processing`; retry_failed picks it up once stuck.
                            let error = format!("{:#}", e);
                            tracing::error!(order_number = %tx.order_number, error = %error, "Failed to record enrichment failure");
                            report.retrying += 1;
                        }
                    }
                }
            }
        }

        Ok(report)
    }

    async fn enrich(&self, tx: &transactions::Model) -> Result<Outcome> {
        if !tx.has_counterparty_identity() {
            self.transactions.mark_skipped(tx.id, "No counterparty identity").await?;
            return Ok(Outcome::Skipped);
        }

        let Some(party) = self.counter_parties.find_or_create_for_transaction(tx).await? else {
            self.transactions.mark_skipped(tx.id, "No counterparty identity").await?;
            return Ok(Outcome::Skipped);
        };

        self.transactions.mark_enriched(tx.id, party.id).await?;
        if let Some(enriched) = self.transactions.find_by_id(tx.id).await? {
            self.trades.upsert_from_transaction(&enriched).await?;
        }
        tracing::debug!(
            order_number = %tx.order_number,
            counter_party_id = party.id,
            "Transaction enriched"
        );
        Ok(Outcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use sea_orm::ConnectionTrait;
    use shared::repositories::NewTransaction;
    use shared::testing::{at, create_user, setup_db};
    use shared::{Exchange, TransactionType};

    fn p2p(user_id: i64, order_number: &str, nickname: Option<&str>, kind: TransactionType) -> NewTransaction {
        NewTransaction {
            user_id,
            exchange: Exchange::Binance,
            order_number: order_number.to_string(),
            transaction_type: kind,
            asset: "USDT".to_string(),
            fiat: Some("PEN".to_string()),
            price: Decimal::new(375, 2),
            quantity: Decimal::new(4, 0),
            total_price: Decimal::new(15, 0),
            fee: Decimal::ZERO,
            fee_asset: None,
            status: "completed".to_string(),
            payment_method: None,
            counterparty_nickname: nickname.map(str::to_string),
            counterparty_merchant_no: None,
            counterparty_full_name: Some("Bob Perez".to_string()),
            counterparty_dni: None,
            raw_data: None,
            transaction_date: at(8, 10),
        }
    }

    #[tokio::test]
    async fn test_batch_enriches_pending_transactions() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let db = Arc::new(db);
        let txs = TransactionRepository::new(db.clone());
        txs.upsert(&p2p(user.id, "E-1", Some("bob"), TransactionType::P2pSell)).await.unwrap();
        txs.upsert(&p2p(user.id, "E-2", Some("bob"), TransactionType::P2pBuy)).await.unwrap();
        txs.upsert(&p2p(user.id, "E-3", None, TransactionType::P2pBuy)).await.unwrap();

        let service = EnrichmentService::new(db.clone());
        let report = service.process_batch(10).await.unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.completed, 2);

        let first = txs.find_by_order_number("E-1").await.unwrap().unwrap();
        let second = txs.find_by_order_number("E-2").await.unwrap().unwrap();
        assert_eq!(first.enrichment_status, "completed");
        assert!(first.enriched_at.is_some());
        assert_eq!(first.counter_party_id, second.counter_party_id);
        assert!(first.counter_party_id.is_some());

        let counts = service.status_counts().await.unwrap();
        assert!(counts.contains(&(EnrichmentStatus::Completed, 2)));
        assert!(counts.contains(&(EnrichmentStatus::Skipped, 1)));
        assert!(counts.contains(&(EnrichmentStatus::Pending, 0)));

        let again = service.process_batch(10).await.unwrap();
        assert_eq!(again, EnrichmentReport::default());
    }

    #[tokio::test]
    async fn test_failure_after_claim_is_recorded_per_row() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let db = Arc::new(db);
        let txs = TransactionRepository::new(db.clone());
        txs.upsert(&p2p(user.id, "E-1", Some("bob"), TransactionType::P2pSell)).await.unwrap();
        txs.upsert(&p2p(user.id, "E-2", Some("carol"), TransactionType::P2pBuy)).await.unwrap();
        db.execute_unprepared("DROP TABLE trade_history").await.unwrap();

        let service = EnrichmentService::new(db.clone());
        let report = service.process_batch(10).await.unwrap();
        assert_eq!(report.processed, 2);
        assert_eq!(report.retrying, 2);
        assert_eq!(report.completed, 0);

        for order_number in ["E-1", "E-2"] {
            let row = txs.find_by_order_number(order_number).await.unwrap().unwrap();
            assert_eq!(row.enrichment_status, "pending");
            assert_eq!(row.enrichment_attempts, 1);
            assert!(row.enrichment_error.is_some());
        }
        let counts = service.status_counts().await.unwrap();
        assert!(counts.contains(&(EnrichmentStatus::Processing, 0)));
    }

    #[tokio::test]
    async fn test_batch_size_is_respected() {
        let db = setup_db().await;
        let user = create_user(&db, "alice").await;
        let db = Arc::new(db);
        let txs = TransactionRepository::new(db.clone());
        for n in 0..5 {
            txs.upsert(&p2p(user.id, &format!("E-{}", n), Some("bob"), TransactionType::P2pSell))
                .await
                .unwrap();
        }

        let service = EnrichmentService::new(db.clone());
        assert_eq!(service.process_batch(3).await.unwrap().processed, 3);
        assert_eq!(service.process_batch(3).await.unwrap().processed, 2);
    }
}
