//! Background task transport, workers and scheduler.
//!
//! # Flow
//!
//! 1. A handler or the [`Scheduler`] calls [`TaskQueue::enqueue`]
//! 2. The envelope is pushed onto its queue in the [`TaskBroker`]
//! 3. A [`TaskWorker`] per queue pops it and runs it through a
//!    [`crate::domain::tasks::TaskHandler`], retrying with backoff

mod broker;
mod memory_broker;
mod redis_broker;
mod scheduler;
mod worker;

pub use broker::{BrokerError, TaskBroker};
pub use memory_broker::MemoryBroker;
pub use redis_broker::RedisBroker;
pub use scheduler::{Schedule, Scheduler};
pub use worker::{TaskWorker, WorkerConfig, execute, spawn_workers};

use metrics::counter;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

use crate::domain::tasks::{Task, TaskEnvelope};
use crate::error::AppError;

/// Producer side of the task system.
#[derive(Clone)]
pub struct TaskQueue {
    broker: Arc<dyn TaskBroker>,
}

impl TaskQueue {
    pub fn new(broker: Arc<dyn TaskBroker>) -> Self {
        Self { broker }
    }

    pub fn broker(&self) -> Arc<dyn TaskBroker> {
        Arc::clone(&self.broker)
    }

    /// Pushes `task` onto the queue it is routed to.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the broker rejects the task.
    pub async fn enqueue(&self, task: Task) -> Result<TaskEnvelope, AppError> {
        let queue = task.queue();
        let envelope = TaskEnvelope::new(task);

        self.broker.push(queue, &envelope).await.map_err(|e| {
            AppError::internal(
                "Failed to enqueue task",
                json!({ "task": envelope.task.name(), "reason": e.to_string() }),
            )
        })?;

        counter!("tasks_enqueued_total", "task" => envelope.task.name()).increment(1);
        info!(task = envelope.task.name(), task_id = %envelope.id, queue = %queue, "Task enqueued");

        Ok(envelope)
    }
}
