//! Task broker trait and error types.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::tasks::{Queue, TaskEnvelope};

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("Task broker unavailable: {0}")]
    Unavailable(String),
    #[error("Malformed task payload: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Transport that carries task envelopes to workers, one FIFO per queue.
///
/// # Implementations
///
/// - [`crate::infrastructure::tasks::RedisBroker`] - Redis lists, shared between processes
/// - [`crate::infrastructure::tasks::MemoryBroker`] - In-process channels
#[async_trait]
pub trait TaskBroker: Send + Sync {
    async fn push(&self, queue: Queue, envelope: &TaskEnvelope) -> Result<(), BrokerError>;

    /// Waits up to `wait` for the next envelope on `queue`.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    async fn pop(&self, queue: Queue, wait: Duration) -> Result<Option<TaskEnvelope>, BrokerError>;

    async fn health_check(&self) -> bool;

    fn backend(&self) -> &'static str;
}
