//! In-process task broker.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

use super::broker::{BrokerError, TaskBroker};
use crate::domain::tasks::{Queue, TaskEnvelope};

struct Channel {
    tx: mpsc::UnboundedSender<TaskEnvelope>,
    rx: Mutex<mpsc::UnboundedReceiver<TaskEnvelope>>,
}

/// Broker backed by unbounded tokio channels, one per queue.
///
/// Tasks live only as long as the process; used when Redis is not configured.
pub struct MemoryBroker {
    channels: HashMap<Queue, Channel>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        let channels = Queue::ALL
            .into_iter()
            .map(|queue| {
                let (tx, rx) = mpsc::unbounded_channel();
                (
                    queue,
                    Channel {
                        tx,
                        rx: Mutex::new(rx),
                    },
                )
            })
            .collect();
        Self { channels }
    }

    fn channel(&self, queue: Queue) -> Result<&Channel, BrokerError> {
        self.channels
            .get(&queue)
            .ok_or_else(|| BrokerError::Unavailable(format!("unknown queue {}", queue)))
    }
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskBroker for MemoryBroker {
    async fn push(&self, queue: Queue, envelope: &TaskEnvelope) -> Result<(), BrokerError> {
        self.channel(queue)?
            .tx
            .send(envelope.clone())
            .map_err(|_| BrokerError::Unavailable(format!("queue {} is closed", queue)))
    }

    async fn pop(&self, queue: Queue, wait: Duration) -> Result<Option<TaskEnvelope>, BrokerError> {
        let mut rx = self.channel(queue)?.rx.lock().await;
        match tokio::time::timeout(wait, rx.recv()).await {
            Ok(envelope) => Ok(envelope),
            Err(_) => Ok(None),
        }
    }

    async fn health_check(&self) -> bool {
        true
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tasks::Task;

    #[tokio::test]
    async fn test_queues_are_fifo_and_separate() {
        let broker = MemoryBroker::new();
        let first = TaskEnvelope::new(Task::ProcessOrder { order_id: 1 });
        let second = TaskEnvelope::new(Task::ProcessOrder { order_id: 2 });

        broker.push(Queue::Orders, &first).await.unwrap();
        broker.push(Queue::Orders, &second).await.unwrap();

        let wait = Duration::from_millis(10);
        assert!(broker.pop(Queue::Maintenance, wait).await.unwrap().is_none());
        assert_eq!(broker.pop(Queue::Orders, wait).await.unwrap(), Some(first));
        assert_eq!(broker.pop(Queue::Orders, wait).await.unwrap(), Some(second));
        assert!(broker.pop(Queue::Orders, wait).await.unwrap().is_none());
    }
}
