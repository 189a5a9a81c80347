//! In-process implementation of the order repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashSet;

use crate::domain::crud::{Page, PageRequest, Value};
use crate::domain::entities::{
    NewOrder, NewOrderItem, Order, OrderFilter, OrderItem, OrderItemFilter, OrderPatch,
    OrderStatus, OrderWithItems, PricedLine,
};
use crate::domain::repositories::{CrudRepository, OrderRepository};
use crate::error::AppError;
use crate::infrastructure::persistence::MemoryCrud;

#[derive(Default)]
pub struct MemoryOrderRepository {
    orders: MemoryCrud<Order>,
    lines: MemoryCrud<OrderItem>,
}

impl MemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for MemoryOrderRepository {
    async fn get(&self, id: i64) -> Result<Option<Order>, AppError> {
        self.orders.get(id).await
    }

    async fn list(&self, page: PageRequest, filter: OrderFilter) -> Result<Page<Order>, AppError> {
        self.orders.get_multi(page, filter).await
    }

    async fn count(&self, filter: OrderFilter) -> Result<i64, AppError> {
        self.orders.count(filter).await
    }

    async fn create_with_items(
        &self,
        owner_id: i64,
        total_amount: Decimal,
        lines: Vec<PricedLine>,
    ) -> Result<OrderWithItems, AppError> {
        // Lock order: orders, then lines.
        let mut orders = self.orders.lock()?;
        let mut stored_lines = self.lines.lock()?;

        let order = orders.insert(NewOrder {
            owner_id,
            status: OrderStatus::Pending,
            total_amount,
        })?;

        let inserted = check_distinct_items(&lines).and_then(|()| {
            let new_lines = lines
                .into_iter()
                .map(|line| NewOrderItem {
                    order_id: order.id,
                    item_id: line.item_id,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                })
                .collect();
            stored_lines.insert_all(new_lines)
        });

        match inserted {
            Ok(items) => Ok(OrderWithItems { order, items }),
            Err(e) => {
                orders.remove(order.id);
                Err(e)
            }
        }
    }

    async fn items_for(&self, order_id: i64) -> Result<Vec<OrderItem>, AppError> {
        self.lines.find_all(&OrderItemFilter {
            order_id: Some(order_id),
        })
    }

    async fn transition(
        &self,
        id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, AppError> {
        self.orders
            .compare_and_update(
                id,
                ("status", Value::from(from.as_str())),
                OrderPatch { status: Some(to) },
            )
            .await
    }

    async fn expire_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        self.orders.update_matching(
            |order| order.status == OrderStatus::Pending && order.created_at < cutoff,
            OrderPatch {
                status: Some(OrderStatus::Cancelled),
            },
        )
    }
}

/// Mirrors the `(order_id, item_id)` unique constraint on `order_items`.
fn check_distinct_items(lines: &[PricedLine]) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    if lines.iter().all(|line| seen.insert(line.item_id)) {
        Ok(())
    } else {
        Err(AppError::conflict(
            "Unique constraint violation",
            json!({ "constraint": "order_items_order_item_key" }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn line(item_id: i64, quantity: i32) -> PricedLine {
        PricedLine {
            item_id,
            quantity,
            unit_price: Decimal::new(500, 2),
        }
    }

    #[tokio::test]
    async fn test_second_cancel_finds_nothing() {
        let repo = MemoryOrderRepository::new();
        let created = repo
            .create_with_items(1, Decimal::new(1000, 2), vec![line(1, 2)])
            .await
            .unwrap();

        let first = repo
            .transition(created.order.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(first.unwrap().status, OrderStatus::Cancelled);

        let second = repo
            .transition(created.order.id, OrderStatus::Pending, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_failed_line_insert_leaves_no_order_behind() {
        let repo = MemoryOrderRepository::new();

        let err = repo
            .create_with_items(1, Decimal::ZERO, vec![line(7, 1), line(7, 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict { .. }));

        assert_eq!(repo.count(OrderFilter::default()).await.unwrap(), 0);
        assert!(repo.items_for(1).await.unwrap().is_empty());

        let ok = repo
            .create_with_items(1, Decimal::ZERO, vec![line(7, 1)])
            .await
            .unwrap();
        assert_eq!(repo.count(OrderFilter::default()).await.unwrap(), 1);
        assert_eq!(repo.items_for(ok.order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_lines_belong_to_their_order() {
        let repo = MemoryOrderRepository::new();
        let a = repo
            .create_with_items(1, Decimal::ZERO, vec![line(1, 1), line(2, 3)])
            .await
            .unwrap();
        let b = repo
            .create_with_items(1, Decimal::ZERO, vec![line(3, 1)])
            .await
            .unwrap();

        let lines = repo.items_for(a.order.id).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.order_id == a.order.id));
        assert_eq!(repo.items_for(b.order.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_expire_stale_only_touches_old_pending_orders() {
        let repo = MemoryOrderRepository::new();
        let old = repo
            .create_with_items(1, Decimal::ZERO, vec![line(1, 1)])
            .await
            .unwrap();
        let processed = repo
            .create_with_items(1, Decimal::ZERO, vec![line(1, 1)])
            .await
            .unwrap();
        repo.transition(processed.order.id, OrderStatus::Pending, OrderStatus::Processed)
            .await
            .unwrap();

        let expired = repo
            .expire_stale(Utc::now() + Duration::seconds(1))
            .await
            .unwrap();
        assert_eq!(expired, 1);

        let old = repo.get(old.order.id).await.unwrap().unwrap();
        assert_eq!(old.status, OrderStatus::Cancelled);

        let none = repo.expire_stale(Utc::now() - Duration::hours(1)).await.unwrap();
        assert_eq!(none, 0);
    }
}
