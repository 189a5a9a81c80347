//! Order placement and lifecycle.
//!
//! ```text
//! pending ──cancel──▶ cancelled
//!    │
//!    └──process (background task)──▶ processed
//! ```
//!
//! Every transition is a compare-and-set on the current status, so two
//! concurrent cancellations cannot both succeed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::info;

use crate::application::permissions::{require_admin, require_owner_or_admin};
use crate::domain::crud::{Page, PageRequest};
use crate::domain::entities::{
    MAX_QUANTITY, MIN_QUANTITY, Order, OrderCounts, OrderFilter, OrderLine, OrderStatus,
    OrderWithItems, PricedLine, User,
};
use crate::domain::repositories::{ItemRepository, OrderRepository};
use crate::domain::tasks::{Task, TaskEnvelope};
use crate::error::AppError;
use crate::infrastructure::tasks::TaskQueue;

pub struct OrderService<
    O: ?Sized + OrderRepository = dyn OrderRepository,
    I: ?Sized + ItemRepository = dyn ItemRepository,
> {
    orders: Arc<O>,
    items: Arc<I>,
    tasks: TaskQueue,
}

impl<O, I> OrderService<O, I>
where
    O: ?Sized + OrderRepository,
    I: ?Sized + ItemRepository,
{
    pub fn new(orders: Arc<O>, items: Arc<I>, tasks: TaskQueue) -> Self {
        Self {
            orders,
            items,
            tasks,
        }
    }

    /// Places a pending order for `owner`.
    ///
    /// Lines are validated before anything is read or written. Unit prices
    /// are snapshotted from the current item prices and the order is written
    /// together with its lines in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] for an empty order, a quantity outside
    /// `1..=100` or an item listed twice, and [`AppError::NotFound`] if any
    /// item does not exist.
    pub async fn create(&self, owner: &User, lines: Vec<OrderLine>) -> Result<OrderWithItems, AppError> {
        validate_lines(&lines)?;

        let ids: Vec<i64> = lines.iter().map(|line| line.item_id).collect();
        let prices: HashMap<i64, Decimal> = self
            .items
            .get_many(&ids)
            .await?
            .into_iter()
            .map(|item| (item.id, item.price))
            .collect();

        let missing: Vec<i64> = ids.iter().copied().filter(|id| !prices.contains_key(id)).collect();
        if !missing.is_empty() {
            return Err(AppError::not_found(
                "Items not found",
                json!({ "item_ids": missing }),
            ));
        }

        let priced: Vec<PricedLine> = lines
            .into_iter()
            .filter_map(|line| {
                prices.get(&line.item_id).map(|unit_price| PricedLine {
                    item_id: line.item_id,
                    quantity: line.quantity,
                    unit_price: *unit_price,
                })
            })
            .collect();

        let total_amount: Decimal = priced
            .iter()
            .map(|line| line.unit_price * Decimal::from(line.quantity))
            .sum();

        let created = self
            .orders
            .create_with_items(owner.id, total_amount, priced)
            .await?;

        info!(
            order_id = created.order.id,
            owner_id = owner.id,
            lines = created.items.len(),
            total = %created.order.total_amount,
            "Order created"
        );

        Ok(created)
    }

    /// Fetches an order with its lines.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the order does not exist and
    /// [`AppError::Forbidden`] unless `actor` owns it or is an admin.
    pub async fn get(&self, actor: &User, id: i64) -> Result<OrderWithItems, AppError> {
        let order = self.fetch(id).await?;
        require_owner_or_admin(actor, order.owner_id, "order")?;

        let items = self.orders.items_for(id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Lists orders. Non-admins only ever see their own orders; admins see all
    /// orders unless they filter by owner.
    pub async fn list(
        &self,
        actor: &User,
        page: PageRequest,
        mut filter: OrderFilter,
    ) -> Result<Page<Order>, AppError> {
        if !actor.is_admin() {
            filter.owner_id = Some(actor.id);
        }
        self.orders.list(page, filter).await
    }

    /// Cancels a pending order.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::BusinessRule`] if the order is not pending,
    /// including when another request cancelled it first.
    pub async fn cancel(&self, actor: &User, id: i64) -> Result<Order, AppError> {
        let order = self.fetch(id).await?;
        require_owner_or_admin(actor, order.owner_id, "order")?;

        self.transition(&order, OrderStatus::Cancelled).await
    }

    /// Schedules background processing of a pending order. Admin only.
    ///
    /// The status is checked up front so obviously invalid requests fail
    /// synchronously; the task re-checks it atomically.
    pub async fn request_processing(&self, actor: &User, id: i64) -> Result<TaskEnvelope, AppError> {
        require_admin(actor)?;

        let order = self.fetch(id).await?;
        if !order.status.can_transition_to(OrderStatus::Processed) {
            return Err(not_pending(&order, OrderStatus::Processed));
        }

        self.tasks.enqueue(Task::ProcessOrder { order_id: id }).await
    }

    /// Moves a pending order to `processed`. Called by the task handler.
    pub async fn mark_processed(&self, id: i64) -> Result<Order, AppError> {
        let order = self.fetch(id).await?;
        self.transition(&order, OrderStatus::Processed).await
    }

    /// Cancels pending orders created before `cutoff`.
    pub async fn expire_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let expired = self.orders.expire_stale(cutoff).await?;
        if expired > 0 {
            info!(expired, cutoff = %cutoff, "Expired stale pending orders");
        }
        Ok(expired)
    }

    /// Number of orders in each status.
    pub async fn usage_snapshot(&self) -> Result<OrderCounts, AppError> {
        let mut counts = OrderCounts::default();
        for status in OrderStatus::ALL {
            let filter = OrderFilter {
                status: Some(status),
                ..Default::default()
            };
            counts.set(status, self.orders.count(filter).await?);
        }
        Ok(counts)
    }

    async fn fetch(&self, id: i64) -> Result<Order, AppError> {
        self.orders
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("Order not found", json!({ "id": id })))
    }

    async fn transition(&self, order: &Order, to: OrderStatus) -> Result<Order, AppError> {
        if !order.status.can_transition_to(to) {
            return Err(not_pending(order, to));
        }

        match self.orders.transition(order.id, order.status, to).await? {
            Some(updated) => {
                info!(order_id = order.id, from = %order.status, to = %to, "Order status changed");
                Ok(updated)
            }
            // Lost a race with a concurrent transition.
            None => Err(AppError::business_rule(
                format!("Only pending orders can be {}", to),
                json!({ "id": order.id }),
            )),
        }
    }
}

fn not_pending(order: &Order, to: OrderStatus) -> AppError {
    AppError::business_rule(
        format!("Only pending orders can be {}", to),
        json!({ "id": order.id, "status": order.status.as_str() }),
    )
}

/// Checks order lines without touching storage.
pub fn validate_lines(lines: &[OrderLine]) -> Result<(), AppError> {
    if lines.is_empty() {
        return Err(AppError::validation(
            "Order must contain at least one line",
            json!({ "field": "items" }),
        ));
    }

    let mut seen = HashSet::new();
    for line in lines {
        if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&line.quantity) {
            return Err(AppError::validation(
                format!("Quantity must be between {} and {}", MIN_QUANTITY, MAX_QUANTITY),
                json!({ "item_id": line.item_id, "quantity": line.quantity }),
            ));
        }
        if !seen.insert(line.item_id) {
            return Err(AppError::validation(
                "Item listed more than once",
                json!({ "item_id": line.item_id }),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::permissions::test_user;
    use crate::domain::entities::{Item, OrderItem, Role};
    use crate::domain::repositories::{MockItemRepository, MockOrderRepository};
    use crate::domain::tasks::Queue;
    use crate::infrastructure::tasks::{MemoryBroker, TaskBroker};
    use std::time::Duration;

    fn order(id: i64, owner_id: i64, status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id,
            owner_id,
            status,
            total_amount: Decimal::new(1000, 2),
            created_at: now,
            updated_at: now,
        }
    }

    fn item(id: i64, cents: i64) -> Item {
        let now = Utc::now();
        Item {
            id,
            title: format!("item {}", id),
            description: None,
            price: Decimal::new(cents, 2),
            owner_id: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn line(item_id: i64, quantity: i32) -> OrderLine {
        OrderLine { item_id, quantity }
    }

    fn service(
        orders: MockOrderRepository,
        items: MockItemRepository,
    ) -> OrderService<MockOrderRepository, MockItemRepository> {
        let broker: Arc<dyn TaskBroker> = Arc::new(MemoryBroker::new());
        OrderService::new(Arc::new(orders), Arc::new(items), TaskQueue::new(broker))
    }

    #[tokio::test]
    async fn test_empty_order_rejected_before_storage() {
        let mut orders = MockOrderRepository::new();
        orders.expect_create_with_items().never();
        let mut items = MockItemRepository::new();
        items.expect_get_many().never();

        let service = service(orders, items);
        let result = service.create(&test_user(1, vec![Role::User]), vec![]).await;

        assert!(matches!(result, Err(AppError::Validation { .. })));
    }

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_lines(&[line(1, 1), line(2, 100)]).is_ok());
        assert!(validate_lines(&[line(1, 0)]).is_err());
        assert!(validate_lines(&[line(1, 101)]).is_err());
        assert!(validate_lines(&[line(1, 2), line(1, 3)]).is_err());
    }

    #[tokio::test]
    async fn test_create_snapshots_prices_and_totals() {
        let mut items = MockItemRepository::new();
        items
            .expect_get_many()
            .times(1)
            .returning(|_| Ok(vec![item(1, 250), item(2, 1000)]));

        let mut orders = MockOrderRepository::new();
        orders
            .expect_create_with_items()
            .withf(|owner_id, total, lines| {
                *owner_id == 7
                    && *total == Decimal::new(2500, 2)
                    && lines.len() == 2
                    && lines[0].unit_price == Decimal::new(250, 2)
            })
            .times(1)
            .returning(|owner_id, total, lines| {
                let now = Utc::now();
                let mut created = order(10, owner_id, OrderStatus::Pending);
                created.total_amount = total;
                let items = lines
                    .into_iter()
                    .enumerate()
                    .map(|(i, l)| OrderItem {
                        id: i as i64 + 1,
                        order_id: 10,
                        item_id: l.item_id,
                        quantity: l.quantity,
                        unit_price: l.unit_price,
                        created_at: now,
                        updated_at: now,
                    })
                    .collect();
                Ok(OrderWithItems {
                    order: created,
                    items,
                })
            });

        let service = service(orders, items);
        let created = service
            .create(&test_user(7, vec![Role::User]), vec![line(1, 2), line(2, 2)])
            .await
            .unwrap();

        assert_eq!(created.order.total_amount, Decimal::new(2500, 2));
        assert_eq!(created.items.len(), 2);
    }

    #[tokio::test]
    async fn test_create_with_unknown_item_is_not_found() {
        let mut items = MockItemRepository::new();
        items.expect_get_many().returning(|_| Ok(vec![item(1, 100)]));
        let mut orders = MockOrderRepository::new();
        orders.expect_create_with_items().never();

        let service = service(orders, items);
        let err = service
            .create(&test_user(7, vec![Role::User]), vec![line(1, 1), line(99, 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound { .. }));
        assert_eq!(err.to_error_info().details["item_ids"], json!([99]));
    }

    #[tokio::test]
    async fn test_cancel_twice_fails_second_time() {
        let mut orders = MockOrderRepository::new();
        let mut calls = 0;
        orders.expect_get().returning(move |id| {
            calls += 1;
            let status = if calls == 1 {
                OrderStatus::Pending
            } else {
                OrderStatus::Cancelled
            };
            Ok(Some(order(id, 7, status)))
        });
        orders
            .expect_transition()
            .withf(|_, from, to| *from == OrderStatus::Pending && *to == OrderStatus::Cancelled)
            .times(1)
            .returning(|id, _, to| Ok(Some(order(id, 7, to))));

        let service = service(orders, MockItemRepository::new());
        let owner = test_user(7, vec![Role::User]);

        let cancelled = service.cancel(&owner, 3).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        assert!(matches!(
            service.cancel(&owner, 3).await,
            Err(AppError::BusinessRule { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_race_lost_is_business_rule() {
        let mut orders = MockOrderRepository::new();
        orders
            .expect_get()
            .returning(|id| Ok(Some(order(id, 7, OrderStatus::Pending))));
        orders.expect_transition().returning(|_, _, _| Ok(None));

        let service = service(orders, MockItemRepository::new());

        assert!(matches!(
            service.cancel(&test_user(7, vec![Role::User]), 3).await,
            Err(AppError::BusinessRule { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_someone_elses_order_is_forbidden() {
        let mut orders = MockOrderRepository::new();
        orders
            .expect_get()
            .returning(|id| Ok(Some(order(id, 7, OrderStatus::Pending))));
        orders.expect_transition().never();

        let service = service(orders, MockItemRepository::new());

        assert!(matches!(
            service.cancel(&test_user(8, vec![Role::User]), 3).await,
            Err(AppError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_scopes_non_admins_to_own_orders() {
        let mut orders = MockOrderRepository::new();
        orders
            .expect_list()
            .withf(|_, filter| filter.owner_id == Some(7))
            .times(1)
            .returning(|_, _| Ok(Page { items: vec![], total: 0 }));
        orders
            .expect_list()
            .withf(|_, filter| filter.owner_id.is_none())
            .times(1)
            .returning(|_, _| Ok(Page { items: vec![], total: 0 }));

        let service = service(orders, MockItemRepository::new());

        let filter = OrderFilter {
            owner_id: Some(99),
            ..Default::default()
        };
        service
            .list(&test_user(7, vec![Role::User]), PageRequest::default(), filter)
            .await
            .unwrap();
        service
            .list(
                &test_user(1, vec![Role::Admin]),
                PageRequest::default(),
                OrderFilter::default(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_request_processing_enqueues_task() {
        let mut orders = MockOrderRepository::new();
        orders
            .expect_get()
            .returning(|id| Ok(Some(order(id, 7, OrderStatus::Pending))));

        let broker = Arc::new(MemoryBroker::new());
        let service = OrderService::new(
            Arc::new(orders),
            Arc::new(MockItemRepository::new()),
            TaskQueue::new(broker.clone()),
        );

        let admin = test_user(1, vec![Role::Admin]);
        let envelope = service.request_processing(&admin, 3).await.unwrap();

        let popped = broker
            .pop(Queue::Orders, Duration::from_millis(100))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped.id, envelope.id);
        assert_eq!(popped.task, Task::ProcessOrder { order_id: 3 });
    }

    #[tokio::test]
    async fn test_request_processing_requires_admin() {
        let service = service(MockOrderRepository::new(), MockItemRepository::new());

        assert!(matches!(
            service
                .request_processing(&test_user(7, vec![Role::User]), 3)
                .await,
            Err(AppError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_usage_snapshot_counts_each_status() {
        let mut orders = MockOrderRepository::new();
        orders.expect_count().times(3).returning(|filter| {
            Ok(match filter.status {
                Some(OrderStatus::Pending) => 4,
                Some(OrderStatus::Processed) => 2,
                _ => 1,
            })
        });

        let service = service(orders, MockItemRepository::new());
        let counts = service.usage_snapshot().await.unwrap();

        assert_eq!(counts.pending, 4);
        assert_eq!(counts.processed, 2);
        assert_eq!(counts.cancelled, 1);
        assert_eq!(counts.total(), 7);
    }
}
