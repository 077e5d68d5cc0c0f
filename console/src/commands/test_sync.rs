use anyhow::Result;
use chrono::Utc;
use shared::Exchange;
use crate::services::SyncService;
use crate::state::AppState;
use super::{error, info, resolve_window, warn, FAILURE, SUCCESS};

const SAMPLE_SIZE: usize = 3;

/// Fetch remote history for every active credential and print what a sync
/// would see. Nothing is written.
pub async fn handle_test_transaction_sync(state: &AppState, days: i64) -> Result<i32> {
    let window = match resolve_window(None, None, days, Utc::now()) {
        Ok(window) => window,
        Err(e) => {
            error(e.to_string());
            return Ok(FAILURE);
        }
    };
    let service = SyncService::new(state.db.clone(), state.cipher.clone(), state.exchanges.clone());

    let mut checked = 0;
    for exchange in Exchange::ALL.iter().copied() {
        let Some(client) = state.exchanges.get(exchange) else {
            continue;
        };
        let active = service.active_credentials(exchange, None).await?;
        for unreadable in &active.unreadable {
            checked += 1;
            warn(format!("{} user {}: {}", exchange, unreadable.user_id, unreadable.error));
        }

        for credential in &active.usable {
            checked += 1;
            match client.fetch_p2p_history(credential, &window).await {
                Ok(orders) => {
                    info(format!(
                        "{} user {}: {} order(s) in the last {} day(s)",
                        exchange, credential.user_id, orders.len(), days
                    ));
                    for order in orders.iter().take(SAMPLE_SIZE) {
                        println!(
                            "    {} {} {} {} @ {} [{}] {}",
                            order.order_number,
                            order.transaction_type,
                            order.quantity,
                            order.asset,
                            order.price,
                            order.status,
                            order.counterparty_nickname.as_deref().unwrap_or("-")
                        );
                    }
                }
                Err(e) => {
                    let message = e.to_string();
                    tracing::warn!(user_id = credential.user_id, exchange = %exchange, error = %message, "Dry run fetch failed");
                    warn(format!("{} user {}: {}", exchange, credential.user_id, message));
                }
            }
        }
    }

    if checked == 0 {
        error("No active exchange credentials found");
        return Ok(FAILURE);
    }
    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::fakes::FakeExchangeClient;
    use crate::exchanges::ExchangeRegistry;
    use crate::state::tests::test_state;
    use rust_decimal::Decimal;
    use shared::repositories::{CredentialRepository, NewTransaction, TransactionRepository};
    use shared::testing::{at, create_user};
    use shared::TransactionType;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_dry_run_without_credentials_fails() {
        let state = test_state(false).await;
        assert_eq!(handle_test_transaction_sync(&state, 7).await.unwrap(), FAILURE);
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let mut state = test_state(false).await;
        let user = create_user(&state.db, "alice").await;
        CredentialRepository::new(state.db.clone(), state.cipher.clone())
            .upsert(Exchange::Bybit, user.id, "key", "secret", None)
            .await
            .unwrap();

        let mut client = FakeExchangeClient::new(Exchange::Bybit);
        client.history.insert(
            user.id,
            vec![NewTransaction {
                user_id: user.id,
                exchange: Exchange::Bybit,
                order_number: "BY-1".to_string(),
                transaction_type: TransactionType::P2pBuy,
                asset: "USDT".to_string(),
                fiat: Some("PEN".to_string()),
                price: Decimal::new(374, 2),
                quantity: Decimal::new(10, 0),
                total_price: Decimal::new(374, 1),
                fee: Decimal::ZERO,
                fee_asset: None,
                status: "completed".to_string(),
                payment_method: None,
                counterparty_nickname: None,
                counterparty_merchant_no: Some("8812".to_string()),
                counterparty_full_name: None,
                counterparty_dni: None,
                raw_data: None,
                transaction_date: at(4, 8),
            }],
        );
        let client = Arc::new(client);
        state.exchanges = ExchangeRegistry::new().register(client.clone());

        assert_eq!(handle_test_transaction_sync(&state, 7).await.unwrap(), SUCCESS);
        assert_eq!(client.calls.lock().await.len(), 1);
        let transactions = TransactionRepository::new(state.db.clone());
        assert_eq!(transactions.count_for_user(user.id).await.unwrap(), 0);
    }
}
