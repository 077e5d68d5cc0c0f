use anyhow::Result;
use shared::QueueConnection;
use std::time::Duration;
use tokio::sync::watch;
use crate::jobs::{self, Envelope, Worker, WorkerOptions};
use crate::state::AppState;
use super::{info, warn, SUCCESS};

pub async fn handle_queue_work(
    state: &AppState,
    queue: Option<String>,
    tries: u32,
    sleep: u64,
    max_time: Option<u64>,
    stop_when_empty: bool,
    shutdown: watch::Receiver<bool>,
) -> Result<i32> {
    if state.queue_connection == QueueConnection::Sync {
        warn("QUEUE_CONNECTION is sync; jobs run when dispatched and nothing is queued for this worker");
    }

    let options = WorkerOptions {
        queue: queue.unwrap_or_else(|| state.default_queue.clone()),
        tries,
        sleep: Duration::from_secs(sleep),
        max_time: max_time.map(Duration::from_secs),
        stop_when_empty,
    };
    info(format!("Processing jobs from the [{}] queue", options.queue));
    tracing::info!(queue = %options.queue, tries, sleep, "Worker started");

    let worker = Worker::new(state.queue.clone(), options, |envelope: Envelope| {
        let state = state.clone();
        async move { jobs::run(&envelope.job, &state).await }
    });
    let stats = worker.run(shutdown).await?;

    info(format!(
        "Worker stopped: {} processed, {} retried, {} failed",
        stats.processed, stats.retried, stats.failed
    ));
    Ok(SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::Job;
    use crate::state::tests::test_state;

    #[tokio::test]
    async fn test_worker_drains_queue_against_state() {
        let state = test_state(false).await;
        state
            .queue
            .push(&Envelope::new("default", Job::ProcessEnrichment { batch_size: 10 }))
            .await
            .unwrap();
        // unknown configuration is a no-op, not an error
        state
            .queue
            .push(&Envelope::new("default", Job::ProcessBotStrategy { config_id: 99 }))
            .await
            .unwrap();

        let (_tx, rx) = watch::channel(false);
        let code = handle_queue_work(&state, None, 2, 0, None, true, rx).await.unwrap();
        assert_eq!(code, SUCCESS);
        assert_eq!(state.queue.len("default").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_worker_reads_named_queue_only() {
        let state = test_state(false).await;
        state
            .queue
            .push(&Envelope::new("market", Job::ProcessEnrichment { batch_size: 1 }))
            .await
            .unwrap();

        let (_tx, rx) = watch::channel(false);
        handle_queue_work(&state, Some("default".to_string()), 1, 0, None, true, rx).await.unwrap();
        assert_eq!(state.queue.len("market").await.unwrap(), 1);
    }
}
