//! Repository implementations.
//!
//! Two interchangeable stores implement the domain repository traits:
//!
//! - [`PgCrud`] / [`PgOrderRepository`] - PostgreSQL via SQLx
//! - [`MemoryCrud`] / [`MemoryOrderRepository`] - in-process maps, selected with
//!   `DATABASE_URL=memory://`
//!
//! [`Repositories`] bundles one of each repository behind trait objects.

pub mod memory_crud;
pub mod memory_order_repository;
pub mod pg_crud;
pub mod pg_order_repository;
mod rows;

pub use memory_crud::MemoryCrud;
pub use memory_order_repository::MemoryOrderRepository;
pub use pg_crud::PgCrud;
pub use pg_order_repository::PgOrderRepository;

use sqlx::PgPool;
use std::sync::Arc;

use crate::domain::entities::{ApiKey, Item, User};
use crate::domain::repositories::{
    ApiKeyRepository, ItemRepository, OrderRepository, UserRepository,
};
use crate::error::AppError;

/// The full set of repositories used by the services.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub items: Arc<dyn ItemRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub api_keys: Arc<dyn ApiKeyRepository>,
    pool: Option<Arc<PgPool>>,
}

impl Repositories {
    pub fn postgres(pool: Arc<PgPool>) -> Self {
        Self {
            users: Arc::new(PgCrud::<User>::new(Arc::clone(&pool))),
            items: Arc::new(PgCrud::<Item>::new(Arc::clone(&pool))),
            orders: Arc::new(PgOrderRepository::new(Arc::clone(&pool))),
            api_keys: Arc::new(PgCrud::<ApiKey>::new(Arc::clone(&pool))),
            pool: Some(pool),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            users: Arc::new(MemoryCrud::<User>::new()),
            items: Arc::new(MemoryCrud::<Item>::new()),
            orders: Arc::new(MemoryOrderRepository::new()),
            api_keys: Arc::new(MemoryCrud::<ApiKey>::new()),
            pool: None,
        }
    }

    /// Name of the backing store, reported by the health endpoint.
    pub fn backend(&self) -> &'static str {
        if self.pool.is_some() {
            "postgres"
        } else {
            "memory"
        }
    }

    /// Checks that the store is reachable.
    pub async fn ping(&self) -> Result<(), AppError> {
        if let Some(pool) = &self.pool {
            sqlx::query("SELECT 1").execute(pool.as_ref()).await?;
        }
        Ok(())
    }
}
