use anyhow::Result;
use chrono::{NaiveDate, Utc};
use shared::Exchange;
use crate::jobs::Job;
use crate::services::SyncService;
use crate::state::AppState;
use super::{error, info, resolve_window, warn, FAILURE, SUCCESS};

pub async fn handle_binance_sync(
    state: &AppState,
    user: Option<i64>,
    days: i64,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    queue: bool,
) -> Result<i32> {
    let window = match resolve_window(start, end, days, Utc::now()) {
        Ok(window) => window,
        Err(e) => {
            error(e.to_string());
            return Ok(FAILURE);
        }
    };

    let service = SyncService::new(state.db.clone(), state.cipher.clone(), state.exchanges.clone());
    let active = service.active_credentials(Exchange::Binance, user).await?;
    if active.is_empty() {
        error("No active Binance credentials found");
        return Ok(FAILURE);
    }
    let total = active.len();
    for unreadable in &active.unreadable {
        error(format!("User {}: {}", unreadable.user_id, unreadable.error));
    }
    let credentials = active.usable;

    info(format!(
        "Syncing Binance P2P history for {} user(s) from {} to {}",
        total,
        window.start.format("%Y-%m-%d %H:%M:%S"),
        window.end.format("%Y-%m-%d %H:%M:%S")
    ));

    if queue {
        for credential in &credentials {
            state
                .dispatch(Job::SyncExchangeTransactions {
                    user_id: credential.user_id,
                    exchange: Exchange::Binance,
                    start: window.start,
                    end: window.end,
                })
                .await?;
            info(format!("Dispatched sync for user {}", credential.user_id));
        }
        return Ok(SUCCESS);
    }

    let mut failed = active.unreadable.len();
    for credential in &credentials {
        match service.sync_credential(credential, &window).await {
            Ok(report) => info(format!(
                "User {}: {} fetched, {} created, {} updated, {} unchanged",
                credential.user_id, report.fetched, report.created, report.updated, report.unchanged
            )),
            Err(e) => {
                failed += 1;
                let message = format!("{:#}", e);
                tracing::error!(user_id = credential.user_id, exchange = "binance", error = %message, "Sync failed");
                error(format!("User {}: {}", credential.user_id, message));
            }
        }
    }
    if failed > 0 {
        warn(format!("{} of {} user(s) failed to sync", failed, total));
    }
    Ok(SUCCESS)
}
