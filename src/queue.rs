//! Queue + Pub/Sub Adapter: blocking pop from the work queue, fire-and-forget
//! publish of status events. Redis-shaped (`BRPOP` / `PUBLISH`), matching
//! `original_source/judge_service/main.py`'s use of `redis.asyncio`.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::error::WorkerError;

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Blocks indefinitely until a job is available, returning its raw JSON
    /// bytes. Popping is the implicit claim — there is no ack.
    async fn blocking_pop(&self, queue_key: &str) -> Result<Vec<u8>, WorkerError>;

    /// Fire-and-forget publish. Must not block or error just because no
    /// subscriber is listening on `channel`.
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), WorkerError>;
}

pub struct RedisJobQueue {
    manager: ConnectionManager,
}

impl RedisJobQueue {
    pub async fn connect(url: &str) -> Result<Self, WorkerError> {
        let client = redis::Client::open(url)
            .map_err(|e| WorkerError::Queue(format!("invalid redis url {url}: {e}")))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| WorkerError::Queue(format!("failed to connect to {url}: {e}")))?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn blocking_pop(&self, queue_key: &str) -> Result<Vec<u8>, WorkerError> {
        let mut conn = self.manager.clone();
        // 0 means block indefinitely (spec.md §4.4).
        let (_key, payload): (String, Vec<u8>) = conn
            .brpop(queue_key, 0.0)
            .await
            .map_err(|e| WorkerError::Queue(format!("BRPOP {queue_key} failed: {e}")))?;
        Ok(payload)
    }

    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), WorkerError> {
        let mut conn = self.manager.clone();
        let _subscriber_count: i64 = conn
            .publish(channel, payload)
            .await
            .map_err(|e| WorkerError::Queue(format!("PUBLISH {channel} failed: {e}")))?;
        Ok(())
    }
}
