//! Redis-backed task broker.

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::time::Duration;
use tokio::time::Instant;

use super::broker::{BrokerError, TaskBroker};
use crate::domain::tasks::{Queue, TaskEnvelope};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Broker storing each queue as a Redis list.
///
/// Producers `LPUSH`, consumers `RPOP`, so each list is a FIFO. Consumers
/// poll instead of blocking so the multiplexed connection stays usable for
/// other commands.
pub struct RedisBroker {
    conn: ConnectionManager,
    key_prefix: String,
}

impl RedisBroker {
    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            key_prefix: "imangor:queue:".to_string(),
        }
    }

    fn key(&self, queue: Queue) -> String {
        format!("{}{}", self.key_prefix, queue.name())
    }
}

#[async_trait]
impl TaskBroker for RedisBroker {
    async fn push(&self, queue: Queue, envelope: &TaskEnvelope) -> Result<(), BrokerError> {
        let payload = serde_json::to_string(envelope)?;
        let mut conn = self.conn.clone();
        conn.lpush::<_, _, ()>(self.key(queue), payload)
            .await
            .map_err(|e| BrokerError::Unavailable(e.to_string()))
    }

    async fn pop(&self, queue: Queue, wait: Duration) -> Result<Option<TaskEnvelope>, BrokerError> {
        let key = self.key(queue);
        let deadline = Instant::now() + wait;
        let mut conn = self.conn.clone();

        loop {
            let payload: Option<String> = conn
                .rpop(&key, None)
                .await
                .map_err(|e| BrokerError::Unavailable(e.to_string()))?;

            if let Some(payload) = payload {
                return Ok(Some(serde_json::from_str(&payload)?));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn health_check(&self) -> bool {
        let mut conn = self.conn.clone();
        conn.ping::<()>().await.is_ok()
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
