use anyhow::Result;
use crate::jobs::{Dispatched, Job};
use crate::state::AppState;
use super::{info, SUCCESS};

pub async fn handle_market_sync(state: &AppState, asset: &str, fiat: &str) -> Result<i32> {
    let asset = asset.trim().to_uppercase();
    let fiat = fiat.trim().to_uppercase();

    let dispatched = state
        .dispatch(Job::SyncMarketData { asset: asset.clone(), fiat: fiat.clone() })
        .await?;
    match dispatched {
        Dispatched::Queued(id) => info(format!("Market sync for {}/{} queued ({})", asset, fiat, id)),
        Dispatched::RanInline => info(format!("Market data for {}/{} synced", asset, fiat)),
    }
    Ok(SUCCESS)
}
