//! Periodic task scheduler.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Instant, interval_at};
use tracing::{error, info};

use super::TaskQueue;
use crate::domain::tasks::Task;

/// A task enqueued at a fixed interval.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub task: Task,
    pub every: Duration,
}

/// Enqueues scheduled tasks until shutdown.
///
/// Each schedule first fires one full interval after startup.
pub struct Scheduler {
    queue: TaskQueue,
    schedules: Vec<Schedule>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Scheduler {
    pub fn new(queue: TaskQueue, schedules: Vec<Schedule>, shutdown_rx: watch::Receiver<bool>) -> Self {
        Self {
            queue,
            schedules,
            shutdown_rx,
        }
    }

    /// Default maintenance schedule.
    pub fn default_schedules(order_pending_ttl_hours: i64) -> Vec<Schedule> {
        vec![
            Schedule {
                task: Task::ExpireStaleOrders {
                    older_than_hours: order_pending_ttl_hours,
                },
                every: Duration::from_secs(60 * 60),
            },
            Schedule {
                task: Task::RefreshUsageMetrics,
                every: Duration::from_secs(60),
            },
        ]
    }

    pub async fn run(self) {
        info!(schedules = self.schedules.len(), "Starting task scheduler");

        let mut set = JoinSet::new();
        for schedule in self.schedules {
            let queue = self.queue.clone();
            let mut shutdown_rx = self.shutdown_rx.clone();

            set.spawn(async move {
                let mut ticker = interval_at(Instant::now() + schedule.every, schedule.every);
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if let Err(e) = queue.enqueue(schedule.task.clone()).await {
                                error!(task = schedule.task.name(), error = %e, "Failed to enqueue scheduled task");
                            }
                        }
                        _ = shutdown_rx.changed() => break,
                    }
                }
            });
        }

        while set.join_next().await.is_some() {}
        info!("Task scheduler stopped");
    }
}
