//! PostgreSQL implementation of the order repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::crud::{Page, PageRequest, Value};
use crate::domain::entities::{
    NewOrder, NewOrderItem, Order, OrderFilter, OrderItem, OrderItemFilter, OrderPatch,
    OrderStatus, OrderWithItems, PricedLine,
};
use crate::domain::repositories::{CrudRepository, OrderRepository};
use crate::error::AppError;
use crate::infrastructure::persistence::PgCrud;

/// PostgreSQL repository for orders and order lines.
///
/// Orders are written together with their lines in one transaction; status
/// changes are single `UPDATE ... WHERE status = $n` statements.
pub struct PgOrderRepository {
    pool: Arc<PgPool>,
    orders: PgCrud<Order>,
    lines: PgCrud<OrderItem>,
}

impl PgOrderRepository {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            orders: PgCrud::new(Arc::clone(&pool)),
            lines: PgCrud::new(Arc::clone(&pool)),
            pool,
        }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
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
        // Rolled back on drop if any statement fails.
        let mut tx = self.pool.begin().await?;

        let order = self
            .orders
            .create_in(
                &mut tx,
                NewOrder {
                    owner_id,
                    status: OrderStatus::Pending,
                    total_amount,
                },
            )
            .await?;

        let new_lines = lines
            .into_iter()
            .map(|line| NewOrderItem {
                order_id: order.id,
                item_id: line.item_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();
        let items = self.lines.bulk_create_in(&mut tx, new_lines).await?;

        tx.commit().await?;

        Ok(OrderWithItems { order, items })
    }

    async fn items_for(&self, order_id: i64) -> Result<Vec<OrderItem>, AppError> {
        self.lines
            .find_all(OrderItemFilter {
                order_id: Some(order_id),
            })
            .await
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
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = $1, updated_at = NOW()
            WHERE status = $2
              AND created_at < $3
            "#,
        )
        .bind(OrderStatus::Cancelled.as_str())
        .bind(OrderStatus::Pending.as_str())
        .bind(cutoff)
        .execute(self.pool.as_ref())
        .await?;

        Ok(result.rows_affected())
    }
}
