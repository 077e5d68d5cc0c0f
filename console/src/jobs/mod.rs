//! Background jobs: what they carry, where they wait and how they run.

pub mod queue;
pub mod worker;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use shared::Exchange;
use uuid::Uuid;
use crate::exchanges::SyncWindow;
use crate::services::{BotStrategyService, EnrichmentService, MarketService, SyncService};
use crate::state::AppState;

pub use queue::{InMemoryQueue, JobQueue, QueueError, RedisQueue};
pub use worker::{Worker, WorkerOptions, WorkerStats};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "job", content = "data")]
pub enum Job {
    SyncExchangeTransactions {
        user_id: i64,
        exchange: Exchange,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    SyncRecentTransactions {
        minutes: i64,
    },
    SyncMarketData {
        asset: String,
        fiat: String,
    },
    ProcessBotStrategy {
        config_id: i64,
    },
    ProcessEnrichment {
        batch_size: u64,
    },
}

impl Job {
    pub fn name(&self) -> &'static str {
        match self {
            Job::SyncExchangeTransactions { .. } => "SyncExchangeTransactions",
            Job::SyncRecentTransactions { .. } => "SyncRecentTransactions",
            Job::SyncMarketData { .. } => "SyncMarketData",
            Job::ProcessBotStrategy { .. } => "ProcessBotStrategy",
            Job::ProcessEnrichment { .. } => "ProcessEnrichment",
        }
    }
}

/// A job as stored on a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: Uuid,
    pub queue: String,
    pub job: Job,
    pub attempts: u32,
    pub pushed_at: DateTime<Utc>,
}

impl Envelope {
    pub fn new(queue: &str, job: Job) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue: queue.to_string(),
            job,
            attempts: 0,
            pushed_at: Utc::now(),
        }
    }
}

/// Where a dispatched job ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatched {
    Queued(Uuid),
    RanInline,
}

/// Execute one job against the application state.
pub async fn run(job: &Job, state: &AppState) -> Result<()> {
    tracing::info!(job = job.name(), "Running job");
    match job {
        Job::SyncExchangeTransactions { user_id, exchange, start, end } => {
            let service = SyncService::new(state.db.clone(), state.cipher.clone(), state.exchanges.clone());
            let window = SyncWindow::new(*start, *end);
            service
                .sync_user(*user_id, *exchange, &window)
                .await
                .with_context(|| format!("Sync of {} transactions for user {} failed", exchange, user_id))?;
        }
        Job::SyncRecentTransactions { minutes } => {
            let service = SyncService::new(state.db.clone(), state.cipher.clone(), state.exchanges.clone());
            let end = Utc::now();
            let window = SyncWindow::new(end - Duration::minutes(*minutes), end);
            let batch = service.sync_all(&window).await;
            tracing::info!(
                minutes,
                synced = batch.synced,
                failed = batch.failed,
                skipped_exchanges = batch.skipped_exchanges,
                created = batch.totals.created,
                updated = batch.totals.updated,
                "Recent transaction sync finished"
            );
        }
        Job::SyncMarketData { asset, fiat } => {
            let service = MarketService::new(state.db.clone(), state.market_source.clone());
            service.sync(asset, fiat, Utc::now()).await?;
        }
        Job::ProcessBotStrategy { config_id } => {
            let service = BotStrategyService::new(state.db.clone(), state.snapshot_max_age_minutes);
            service.process(*config_id, Utc::now()).await?;
        }
        Job::ProcessEnrichment { batch_size } => {
            let service = EnrichmentService::new(state.db.clone());
            let report = service.process_batch(*batch_size).await?;
            tracing::info!(
                processed = report.processed,
                completed = report.completed,
                skipped = report.skipped,
                failed = report.failed,
                "Enrichment batch finished"
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_wire_format() {
        let job = Job::SyncMarketData {
            asset: "USDT".to_string(),
            fiat: "PEN".to_string(),
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"job": "SyncMarketData", "data": {"asset": "USDT", "fiat": "PEN"}})
        );
    }

    #[test]
    fn test_envelope_survives_serialization() {
        let envelope = Envelope::new("default", Job::ProcessBotStrategy { config_id: 4 });
        let text = serde_json::to_string(&envelope).unwrap();
        let back: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(back, envelope);
        assert_eq!(back.job.name(), "ProcessBotStrategy");
    }
}
