//! Background task model.
//!
//! Tasks are serialized into a [`TaskEnvelope`], pushed onto the queue their
//! kind is routed to, and executed by a worker through a [`TaskHandler`].
//!
//! # Queues
//!
//! | Task | Queue |
//! |---|---|
//! | `process_order` | `orders` |
//! | `expire_stale_orders` | `maintenance` |
//! | `refresh_usage_metrics` | `maintenance` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::AppError;

/// Named queue a task is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Queue {
    Orders,
    Maintenance,
}

impl Queue {
    pub const ALL: [Queue; 2] = [Queue::Orders, Queue::Maintenance];

    pub fn name(&self) -> &'static str {
        match self {
            Queue::Orders => "orders",
            Queue::Maintenance => "maintenance",
        }
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A unit of background work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "args", rename_all = "snake_case")]
pub enum Task {
    /// Moves a pending order to `processed`.
    ProcessOrder { order_id: i64 },
    /// Cancels pending orders older than the given age.
    ExpireStaleOrders { older_than_hours: i64 },
    /// Recomputes user and order gauges.
    RefreshUsageMetrics,
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::ProcessOrder { .. } => "process_order",
            Task::ExpireStaleOrders { .. } => "expire_stale_orders",
            Task::RefreshUsageMetrics => "refresh_usage_metrics",
        }
    }

    pub fn queue(&self) -> Queue {
        match self {
            Task::ProcessOrder { .. } => Queue::Orders,
            Task::ExpireStaleOrders { .. } | Task::RefreshUsageMetrics => Queue::Maintenance,
        }
    }
}

/// A task as it travels through the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: String,
    pub task: Task,
    pub enqueued_at: DateTime<Utc>,
}

impl TaskEnvelope {
    pub fn new(task: Task) -> Self {
        Self {
            id: format!("{:016x}", rand::random::<u64>()),
            task,
            enqueued_at: Utc::now(),
        }
    }
}

/// Outcome of a failed task attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    /// Transient failure; the attempt may be retried.
    #[error("retryable: {0}")]
    Retryable(String),
    /// The task can never succeed; do not retry.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl TaskError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TaskError::Retryable(_))
    }
}

impl From<AppError> for TaskError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Internal { message, .. } => TaskError::Retryable(message),
            other => TaskError::Permanent(other.to_string()),
        }
    }
}

/// Retry behaviour for failed task attempts.
///
/// Delays grow exponentially from `base_delay`, capped at `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 = run once).
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: Duration::from_secs(60),
        }
    }

    /// Upper bound of the delay before retry `attempt` (1-indexed), before jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .saturating_mul(multiplier)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Executes tasks pulled from a queue.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn handle(&self, task: &Task) -> Result<(), TaskError>;
}
