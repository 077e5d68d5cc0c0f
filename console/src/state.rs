use anyhow::Result;
use sea_orm::DatabaseConnection;
use shared::{get_db_connection, get_redis_client, Config, CredentialCipher, QueueConnection};
use std::sync::Arc;
use crate::exchanges::{BinanceClient, BinanceP2pMarket, BybitClient, ExchangeRegistry, MarketDataSource};
use crate::jobs::{self, Dispatched, Envelope, InMemoryQueue, Job, JobQueue, RedisQueue};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub cipher: CredentialCipher,
    pub exchanges: ExchangeRegistry,
    pub market_source: Arc<dyn MarketDataSource>,
    pub queue: Arc<dyn JobQueue>,
    pub queue_connection: QueueConnection,
    pub default_queue: String,
    pub snapshot_max_age_minutes: i64,
    pub enrichment_batch_size: u64,
}

impl AppState {
    pub async fn new(config: &Config) -> Result<Self, anyhow::Error> {
        let db = get_db_connection(&config.database_url).await?;
        tracing::info!("Connected to database successfully");

        let queue: Arc<dyn JobQueue> = match config.queue_connection {
            QueueConnection::Redis => {
                let client = get_redis_client(&config.redis_url)?;
                Arc::new(RedisQueue::connect(&client).await?)
            }
            QueueConnection::Sync => Arc::new(InMemoryQueue::new()),
        };

        let exchanges = ExchangeRegistry::new()
            .register(Arc::new(BinanceClient::new(&config.binance_api_url)))
            .register(Arc::new(BybitClient::new(&config.bybit_api_url)));

        Ok(AppState {
            db: Arc::new(db),
            cipher: CredentialCipher::new(config.require_app_key()?)?,
            exchanges,
            market_source: Arc::new(BinanceP2pMarket::new(&config.binance_p2p_url)),
            queue,
            queue_connection: config.queue_connection,
            default_queue: config.default_queue.clone(),
            snapshot_max_age_minutes: config.snapshot_max_age_minutes,
            enrichment_batch_size: config.enrichment_batch_size,
        })
    }

    /// Queue the job, or run it right away when the queue connection is
    /// `sync`.
    pub async fn dispatch(&self, job: Job) -> Result<Dispatched> {
        match self.queue_connection {
            QueueConnection::Sync => {
                jobs::run(&job, self).await?;
                Ok(Dispatched::RanInline)
            }
            QueueConnection::Redis => {
                let envelope = Envelope::new(&self.default_queue, job);
                self.queue.push(&envelope).await?;
                tracing::info!(job = envelope.job.name(), id = %envelope.id, queue = %envelope.queue, "Job dispatched");
                Ok(Dispatched::Queued(envelope.id))
            }
        }
    }
}
