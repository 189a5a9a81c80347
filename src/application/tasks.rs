//! Execution of background tasks against the services.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use metrics::gauge;
use std::sync::Arc;
use tracing::info;

use crate::application::services::{OrderService, UserService};
use crate::domain::entities::{OrderCounts, UserFilter};
use crate::domain::tasks::{Task, TaskError, TaskHandler};
use crate::error::AppError;

/// User and order counts published as gauges.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageSnapshot {
    pub users_total: i64,
    pub users_active: i64,
    pub orders: OrderCounts,
}

/// Routes every [`Task`] to the service operation that performs it.
///
/// Failures map onto [`TaskError`] through `From<AppError>`: storage errors
/// are retried, anything else (a missing or no-longer-pending order) is
/// permanent.
pub struct AppTaskHandler {
    users: Arc<UserService>,
    orders: Arc<OrderService>,
}

impl AppTaskHandler {
    pub fn new(users: Arc<UserService>, orders: Arc<OrderService>) -> Self {
        Self { users, orders }
    }

    /// Counts users and orders.
    pub async fn usage_snapshot(&self) -> Result<UsageSnapshot, AppError> {
        let users_total = self.users.count(UserFilter::default()).await?;
        let users_active = self
            .users
            .count(UserFilter {
                is_active: Some(true),
                ..Default::default()
            })
            .await?;
        let orders = self.orders.usage_snapshot().await?;

        Ok(UsageSnapshot {
            users_total,
            users_active,
            orders,
        })
    }

    async fn refresh_usage_metrics(&self) -> Result<(), AppError> {
        let snapshot = self.usage_snapshot().await?;

        gauge!("users_total").set(snapshot.users_total as f64);
        gauge!("users_active_total").set(snapshot.users_active as f64);
        gauge!("orders_total", "status" => "pending").set(snapshot.orders.pending as f64);
        gauge!("orders_total", "status" => "processed").set(snapshot.orders.processed as f64);
        gauge!("orders_total", "status" => "cancelled").set(snapshot.orders.cancelled as f64);

        Ok(())
    }
}

#[async_trait]
impl TaskHandler for AppTaskHandler {
    async fn handle(&self, task: &Task) -> Result<(), TaskError> {
        match task {
            Task::ProcessOrder { order_id } => {
                let order = self.orders.mark_processed(*order_id).await?;
                info!(order_id = order.id, "Order processed");
            }
            Task::ExpireStaleOrders { older_than_hours } => {
                let cutoff = Duration::try_hours(*older_than_hours)
                    .and_then(|age| Utc::now().checked_sub_signed(age))
                    .ok_or_else(|| {
                        TaskError::Permanent(format!(
                            "older_than_hours out of range: {}",
                            older_than_hours
                        ))
                    })?;
                self.orders.expire_stale(cutoff).await?;
            }
            Task::RefreshUsageMetrics => self.refresh_usage_metrics().await?,
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::Registration;
    use crate::domain::entities::{NewItem, OrderStatus, PricedLine};
    use crate::infrastructure::persistence::Repositories;
    use crate::infrastructure::tasks::{MemoryBroker, TaskBroker, TaskQueue};
    use rust_decimal::Decimal;

    struct Fixture {
        repos: Repositories,
        handler: AppTaskHandler,
        owner_id: i64,
        item_id: i64,
    }

    async fn fixture() -> Fixture {
        let repos = Repositories::in_memory();
        let broker: Arc<dyn TaskBroker> = Arc::new(MemoryBroker::new());

        let users: Arc<UserService> = Arc::new(UserService::new(Arc::clone(&repos.users)));
        let orders: Arc<OrderService> = Arc::new(OrderService::new(
            Arc::clone(&repos.orders),
            Arc::clone(&repos.items),
            TaskQueue::new(broker),
        ));

        let owner = users
            .register(Registration {
                email: "owner@example.com".to_string(),
                password: "password-123".to_string(),
                full_name: None,
            })
            .await
            .unwrap();

        let item = repos
            .items
            .create(NewItem {
                title: "Lamp".to_string(),
                description: None,
                price: Decimal::new(1000, 2),
                owner_id: owner.id,
            })
            .await
            .unwrap();

        Fixture {
            handler: AppTaskHandler::new(users, orders),
            owner_id: owner.id,
            item_id: item.id,
            repos,
        }
    }

    async fn place_order(fx: &Fixture) -> i64 {
        let line = PricedLine {
            item_id: fx.item_id,
            quantity: 1,
            unit_price: Decimal::new(1000, 2),
        };
        fx.repos
            .orders
            .create_with_items(fx.owner_id, Decimal::new(1000, 2), vec![line])
            .await
            .unwrap()
            .order
            .id
    }

    #[tokio::test]
    async fn test_process_order_marks_processed_once() {
        let fx = fixture().await;
        let order_id = place_order(&fx).await;

        let task = Task::ProcessOrder { order_id };
        fx.handler.handle(&task).await.unwrap();

        let order = fx.repos.orders.get(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processed);

        // A second run can never succeed, so it must not be retried.
        let err = fx.handler.handle(&task).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_process_missing_order_is_permanent() {
        let fx = fixture().await;
        let err = fx
            .handler
            .handle(&Task::ProcessOrder { order_id: 404 })
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_expire_stale_orders_with_zero_age_cancels_pending() {
        let fx = fixture().await;
        let order_id = place_order(&fx).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        fx.handler
            .handle(&Task::ExpireStaleOrders { older_than_hours: 0 })
            .await
            .unwrap();

        let order = fx.repos.orders.get(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_expire_stale_orders_rejects_unrepresentable_age() {
        let fx = fixture().await;
        let order_id = place_order(&fx).await;

        let err = fx
            .handler
            .handle(&Task::ExpireStaleOrders {
                older_than_hours: i64::MAX,
            })
            .await
            .unwrap_err();
        assert!(!err.is_retryable());

        let order = fx.repos.orders.get(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_usage_snapshot() {
        let fx = fixture().await;
        place_order(&fx).await;
        place_order(&fx).await;

        fx.handler.handle(&Task::RefreshUsageMetrics).await.unwrap();
        let snapshot = fx.handler.usage_snapshot().await.unwrap();

        assert_eq!(snapshot.users_total, 1);
        assert_eq!(snapshot.users_active, 1);
        assert_eq!(snapshot.orders.pending, 2);
        assert_eq!(snapshot.orders.total(), 2);
    }
}
