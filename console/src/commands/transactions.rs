use anyhow::Result;
use crate::jobs::{Dispatched, Job};
use crate::state::AppState;
use super::{error, info, FAILURE, SUCCESS};

pub async fn handle_sync_recent(state: &AppState, minutes: i64) -> Result<i32> {
    if minutes <= 0 {
        error(format!("--minutes must be positive, got {}", minutes));
        return Ok(FAILURE);
    }

    match state.dispatch(Job::SyncRecentTransactions { minutes }).await? {
        Dispatched::Queued(id) => info(format!("Sync of the last {} minutes queued ({})", minutes, id)),
        Dispatched::RanInline => info(format!("Synced the last {} minutes", minutes)),
    }
    Ok(SUCCESS)
}
