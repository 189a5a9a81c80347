//! Repository trait for orders and their lines.

use crate::domain::crud::{Page, PageRequest};
use crate::domain::entities::{Order, OrderFilter, OrderItem, OrderStatus, OrderWithItems, PricedLine};
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Repository interface for orders.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgOrderRepository`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryOrderRepository`] - In-process store
/// - Test mocks available with `cfg(test)`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Order>, AppError>;

    async fn list(&self, page: PageRequest, filter: OrderFilter) -> Result<Page<Order>, AppError>;

    async fn count(&self, filter: OrderFilter) -> Result<i64, AppError>;

    /// Writes a pending order and all of its lines atomically.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if a referenced item or owner no longer exists.
    async fn create_with_items(
        &self,
        owner_id: i64,
        total_amount: Decimal,
        lines: Vec<PricedLine>,
    ) -> Result<OrderWithItems, AppError>;

    /// Lines of an order, ordered by id.
    async fn items_for(&self, order_id: i64) -> Result<Vec<OrderItem>, AppError>;

    /// Moves an order from `from` to `to` in a single compare-and-set.
    ///
    /// Returns `Ok(None)` if the order is missing or not currently in `from`.
    async fn transition(
        &self,
        id: i64,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Option<Order>, AppError>;

    /// Cancels every pending order created before `cutoff`.
    ///
    /// Returns the number of cancelled orders.
    async fn expire_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}
