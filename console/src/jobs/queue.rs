use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use shared::queue_key;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;
use super::Envelope;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("malformed job payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn push(&self, envelope: &Envelope) -> Result<(), QueueError>;

    /// Oldest waiting job on `queue`, if any.
    async fn pop(&self, queue: &str) -> Result<Option<Envelope>, QueueError>;

    async fn len(&self, queue: &str) -> Result<u64, QueueError>;
}

/// FIFO on Redis lists: LPUSH to enqueue, RPOP to take.
pub struct RedisQueue {
    conn: MultiplexedConnection,
}

impl RedisQueue {
    pub async fn connect(client: &shared::Redis) -> Result<Self, QueueError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn push(&self, envelope: &Envelope) -> Result<(), QueueError> {
        let payload = serde_json::to_string(envelope)?;
        let mut conn = self.conn.clone();
        let _: i64 = conn.lpush(queue_key(&envelope.queue), payload).await?;
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<Option<Envelope>, QueueError> {
        let mut conn = self.conn.clone();
        let payload: Option<String> = conn.rpop(queue_key(queue), None).await?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn len(&self, queue: &str) -> Result<u64, QueueError> {
        let mut conn = self.conn.clone();
        let len: u64 = conn.llen(queue_key(queue)).await?;
        Ok(len)
    }
}

/// Process-local queue used with `QUEUE_CONNECTION=sync` and in tests.
#[derive(Default)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<Envelope>>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    async fn push(&self, envelope: &Envelope) -> Result<(), QueueError> {
        self.queues
            .lock()
            .await
            .entry(envelope.queue.clone())
            .or_default()
            .push_back(envelope.clone());
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<Option<Envelope>, QueueError> {
        Ok(self
            .queues
            .lock()
            .await
            .get_mut(queue)
            .and_then(|q| q.pop_front()))
    }

    async fn len(&self, queue: &str) -> Result<u64, QueueError> {
        Ok(self
            .queues
            .lock()
            .await
            .get(queue)
            .map(|q| q.len() as u64)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::Job;

    #[tokio::test]
    async fn test_in_memory_queue_is_fifo_per_queue() {
        let queue = InMemoryQueue::new();
        let first = Envelope::new("default", Job::ProcessBotStrategy { config_id: 1 });
        let second = Envelope::new("default", Job::ProcessBotStrategy { config_id: 2 });
        let other = Envelope::new("market", Job::SyncRecentTransactions { minutes: 10 });
        queue.push(&first).await.unwrap();
        queue.push(&second).await.unwrap();
        queue.push(&other).await.unwrap();

        assert_eq!(queue.len("default").await.unwrap(), 2);
        assert_eq!(queue.pop("default").await.unwrap().unwrap().id, first.id);
        assert_eq!(queue.pop("default").await.unwrap().unwrap().id, second.id);
        assert!(queue.pop("default").await.unwrap().is_none());
        assert_eq!(queue.len("market").await.unwrap(), 1);
        assert!(queue.pop("missing").await.unwrap().is_none());
    }
}
