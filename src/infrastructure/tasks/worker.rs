//! Queue workers executing tasks with retry and backoff.

use metrics::counter;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;
use tokio_retry::RetryIf;
use tokio_retry::strategy::jitter;
use tracing::{error, info, warn};

use super::broker::TaskBroker;
use crate::domain::tasks::{Queue, RetryPolicy, TaskEnvelope, TaskError, TaskHandler};

/// Configuration shared by all queue workers.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Tasks executed at the same time per queue.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// How long a single broker poll waits before checking for shutdown.
    pub poll_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            retry: RetryPolicy::default(),
            poll_timeout: Duration::from_secs(1),
        }
    }
}

/// Runs one task to completion, retrying retryable failures.
///
/// The task is attempted once and then retried at most
/// `policy.max_retries` times with exponential backoff and full jitter.
/// Permanent failures stop immediately.
pub async fn execute(
    handler: &dyn TaskHandler,
    envelope: &TaskEnvelope,
    policy: &RetryPolicy,
) -> Result<(), TaskError> {
    let name = envelope.task.name();
    let attempts = AtomicUsize::new(0);

    let delays = (1..=policy.max_retries as u32)
        .map(|attempt| policy.delay_for_attempt(attempt))
        .map(jitter);

    let result = RetryIf::start(
        delays,
        || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                let result = handler.handle(&envelope.task).await;
                if let Err(e) = &result {
                    warn!(task = name, task_id = %envelope.id, attempt, error = %e, "Task attempt failed");
                }
                result
            }
        },
        TaskError::is_retryable,
    )
    .await;

    let attempts = attempts.load(Ordering::SeqCst);
    if attempts > 1 {
        counter!("tasks_retried_total", "task" => name).increment((attempts - 1) as u64);
    }

    match &result {
        Ok(()) => {
            counter!("tasks_succeeded_total", "task" => name).increment(1);
        }
        Err(e) => {
            counter!("tasks_failed_total", "task" => name).increment(1);
            error!(task = name, task_id = %envelope.id, attempts, error = %e, "Task failed permanently");
        }
    }

    result
}

/// Consumes one queue with bounded concurrency until shutdown.
pub struct TaskWorker {
    queue: Queue,
    broker: Arc<dyn TaskBroker>,
    handler: Arc<dyn TaskHandler>,
    config: WorkerConfig,
    shutdown_rx: watch::Receiver<bool>,
}

impl TaskWorker {
    pub fn new(
        queue: Queue,
        broker: Arc<dyn TaskBroker>,
        handler: Arc<dyn TaskHandler>,
        config: WorkerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            queue,
            broker,
            handler,
            config,
            shutdown_rx,
        }
    }

    pub async fn run(mut self) {
        let concurrency = self.config.concurrency.max(1);
        let slots = Arc::new(Semaphore::new(concurrency));

        info!(
            queue = %self.queue,
            concurrency,
            backend = self.broker.backend(),
            "Starting task worker"
        );

        loop {
            let permit = tokio::select! {
                permit = Arc::clone(&slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = self.shutdown_rx.changed() => break,
            };

            let popped = tokio::select! {
                popped = self.broker.pop(self.queue, self.config.poll_timeout) => popped,
                _ = self.shutdown_rx.changed() => break,
            };

            let envelope = match popped {
                Ok(Some(envelope)) => envelope,
                Ok(None) => continue,
                Err(e) => {
                    error!(queue = %self.queue, error = %e, "Failed to pop task");
                    tokio::time::sleep(self.config.poll_timeout).await;
                    continue;
                }
            };

            let handler = Arc::clone(&self.handler);
            let policy = self.config.retry.clone();
            tokio::spawn(async move {
                let _permit = permit;
                let _ = execute(handler.as_ref(), &envelope, &policy).await;
            });
        }

        // Wait for in-flight tasks.
        let _ = slots.acquire_many(concurrency as u32).await;
        info!(queue = %self.queue, "Task worker stopped");
    }
}

/// Spawns one worker per queue.
pub fn spawn_workers(
    broker: Arc<dyn TaskBroker>,
    handler: Arc<dyn TaskHandler>,
    config: WorkerConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    Queue::ALL
        .into_iter()
        .map(|queue| {
            let worker = TaskWorker::new(
                queue,
                Arc::clone(&broker),
                Arc::clone(&handler),
                config.clone(),
                shutdown_rx.clone(),
            );
            tokio::spawn(worker.run())
        })
        .collect()
}
