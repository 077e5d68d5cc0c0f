use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use super::{Envelope, JobQueue};

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub queue: String,
    /// Attempts per job before it is dropped.
    pub tries: u32,
    pub sleep: Duration,
    pub max_time: Option<Duration>,
    pub stop_when_empty: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: usize,
    pub retried: usize,
    pub failed: usize,
}

/// Sequential queue consumer. The job body is supplied by the caller so the
/// loop can be driven without a database.
pub struct Worker<F> {
    queue: Arc<dyn JobQueue>,
    options: WorkerOptions,
    handler: F,
}

impl<F, Fut> Worker<F>
where
    F: Fn(Envelope) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    pub fn new(queue: Arc<dyn JobQueue>, options: WorkerOptions, handler: F) -> Self {
        Self { queue, options, handler }
    }

    /// Work until the queue drains (with `stop_when_empty`), `max_time`
    /// passes or `shutdown` flips to true. A job in flight always finishes.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<WorkerStats> {
        let started = Instant::now();
        let tries = self.options.tries.max(1);
        let mut stats = WorkerStats::default();

        loop {
            if *shutdown.borrow() {
                tracing::info!("Worker received shutdown signal");
                break;
            }
            if let Some(max_time) = self.options.max_time {
                if started.elapsed() >= max_time {
                    tracing::info!(max_time_secs = max_time.as_secs(), "Worker reached max time");
                    break;
                }
            }

            let envelope = match self.queue.pop(&self.options.queue).await? {
                Some(envelope) => envelope,
                None => {
                    if self.options.stop_when_empty {
                        break;
                    }
                    let closed = tokio::select! {
                        _ = tokio::time::sleep(self.options.sleep) => false,
                        changed = shutdown.changed() => changed.is_err(),
                    };
                    if closed {
                        tracing::warn!("Shutdown signal closed, stopping worker");
                        break;
                    }
                    continue;
                }
            };

            let mut envelope = envelope;
            envelope.attempts += 1;
            let job = envelope.job.name();
            match (self.handler)(envelope.clone()).await {
                Ok(()) => {
                    stats.processed += 1;
                    tracing::info!(job, id = %envelope.id, attempts = envelope.attempts, "Job processed");
                }
                Err(e) if envelope.attempts < tries => {
                    let error = format!("{:#}", e);
                    tracing::warn!(job, id = %envelope.id, attempts = envelope.attempts, error = %error, "Job failed, retrying");
                    self.queue.push(&envelope).await?;
                    stats.retried += 1;
                }
                Err(e) => {
                    let error = format!("{:#}", e);
                    tracing::error!(job, id = %envelope.id, attempts = envelope.attempts, error = %error, "Job failed permanently");
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }
}
