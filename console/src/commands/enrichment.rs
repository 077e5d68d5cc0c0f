use anyhow::Result;
use std::time::Duration;
use tokio::sync::watch;
use crate::services::{EnrichmentReport, EnrichmentService};
use crate::state::AppState;
use shared::EnrichmentStatus;
use super::{info, SUCCESS};

pub async fn handle_enrichment_check(state: &AppState) -> Result<i32> {
    let service = EnrichmentService::new(state.db.clone());
    let counts = service.status_counts().await?;

    println!("{:<12} {:>8}", "Status", "Count");
    let mut total = 0;
    for status in EnrichmentStatus::ALL {
        let count = counts
            .iter()
            .find(|(s, _)| s == status)
            .map(|(_, c)| *c)
            .unwrap_or(0);
        total += count;
        println!("{:<12} {:>8}", status, count);
    }
    println!("{:<12} {:>8}", "total", total);
    Ok(SUCCESS)
}

/// Drain the enrichment backlog batch by batch. Without `stop_when_empty`
/// the loop keeps polling until `shutdown` fires.
pub async fn handle_enrichment_process(
    state: &AppState,
    stop_when_empty: bool,
    retry_failed: bool,
    batch_size: Option<u64>,
    sleep: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> Result<i32> {
    let service = EnrichmentService::new(state.db.clone());
    if retry_failed {
        let requeued = service.retry_failed().await?;
        info(format!("Re-queued {} failed transaction(s)", requeued));
    }
    let batch_size = batch_size.unwrap_or(state.enrichment_batch_size).max(1);
    let mut totals = EnrichmentReport::default();

    loop {
        if *shutdown.borrow() {
            tracing::info!("Enrichment interrupted");
            break;
        }

        let report = service.process_batch(batch_size).await?;
        totals.processed += report.processed;
        totals.completed += report.completed;
        totals.skipped += report.skipped;
        totals.retrying += report.retrying;
        totals.failed += report.failed;

        if report.processed > 0 {
            tracing::info!(
                processed = report.processed,
                completed = report.completed,
                skipped = report.skipped,
                retrying = report.retrying,
                failed = report.failed,
                "Enrichment batch processed"
            );
            continue;
        }

        if stop_when_empty {
            break;
        }
        let closed = tokio::select! {
            _ = tokio::time::sleep(sleep) => false,
            changed = shutdown.changed() => changed.is_err(),
        };
        if closed {
            tracing::warn!("Shutdown signal closed, stopping enrichment");
            break;
        }
    }

    info(format!(
        "Enrichment finished: {} processed, {} completed, {} skipped, {} retrying, {} failed",
        totals.processed, totals.completed, totals.skipped, totals.retrying, totals.failed
    ));
    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::test_state;
    use rust_decimal::Decimal;
    use shared::repositories::{NewTransaction, TransactionRepository};
    use shared::testing::{at, create_user};
    use shared::{Exchange, TransactionType};

    fn order(user_id: i64, order_number: &str, nickname: Option<&str>) -> NewTransaction {
        NewTransaction {
            user_id,
            exchange: Exchange::Binance,
            order_number: order_number.to_string(),
            transaction_type: TransactionType::P2pBuy,
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
            transaction_date: at(3, 10),
        }
    }

    #[tokio::test]
    async fn test_process_until_empty() {
        let state = test_state(false).await;
        let user = create_user(&state.db, "alice").await;
        let repo = TransactionRepository::new(state.db.clone());
        for i in 0..3 {
            repo.upsert(&order(user.id, &format!("ord-{}", i), Some("carlos"))).await.unwrap();
        }
        repo.upsert(&order(user.id, "ord-anon", None)).await.unwrap();

        let (_tx, rx) = watch::channel(false);
        let code = handle_enrichment_process(&state, true, false, Some(2), Duration::from_millis(10), rx)
            .await
            .unwrap();
        assert_eq!(code, SUCCESS);

        let counts = repo.count_by_enrichment_status().await.unwrap();
        let completed = counts.iter().find(|(s, _)| *s == EnrichmentStatus::Completed).map(|(_, c)| *c);
        assert_eq!(completed, Some(3));
        assert!(repo.pending_enrichment(10).await.unwrap().is_empty());
        assert_eq!(handle_enrichment_check(&state).await.unwrap(), SUCCESS);
    }

    #[tokio::test]
    async fn test_polling_stops_on_shutdown() {
        let state = test_state(false).await;
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            handle_enrichment_process(&state, false, false, None, Duration::from_secs(60), rx).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        let code = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(code, SUCCESS);
    }

    #[tokio::test]
    async fn test_polling_stops_when_shutdown_sender_is_gone() {
        let state = test_state(false).await;
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let code = tokio::time::timeout(
            Duration::from_secs(5),
            handle_enrichment_process(&state, false, false, None, Duration::from_secs(60), rx),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(code, SUCCESS);
    }
}
