//! Generic CRUD repository shared by every model.

use crate::domain::crud::{Model, Page, PageRequest, Value};
use crate::error::AppError;
use async_trait::async_trait;

/// Uniform create/read/update access to one model's table.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::PgCrud`] - PostgreSQL implementation
/// - [`crate::infrastructure::persistence::MemoryCrud`] - In-process store
///
/// Per-model repositories ([`super::UserRepository`], [`super::ItemRepository`],
/// [`super::ApiKeyRepository`]) are implemented on top of this trait.
#[async_trait]
pub trait CrudRepository<M: Model>: Send + Sync {
    /// Fetches one entity by id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on storage errors.
    async fn get(&self, id: i64) -> Result<Option<M>, AppError>;

    /// Fetches every entity whose id is in `ids`, ordered by id.
    ///
    /// Missing ids are silently skipped.
    async fn get_many(&self, ids: &[i64]) -> Result<Vec<M>, AppError>;

    /// Returns one page of entities matching `filter`, ordered by ascending id,
    /// together with the number of matching rows.
    async fn get_multi(&self, page: PageRequest, filter: M::Filter) -> Result<Page<M>, AppError>;

    /// Counts entities matching `filter`.
    async fn count(&self, filter: M::Filter) -> Result<i64, AppError>;

    /// Persists a new entity and returns it with generated id and timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] on unique violations.
    async fn create(&self, data: M::Create) -> Result<M, AppError>;

    /// Applies a partial update and returns the updated entity.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no entity has this id.
    /// Returns [`AppError::Conflict`] on unique violations.
    async fn update(&self, id: i64, data: M::Update) -> Result<M, AppError>;

    /// Persists every row in a single statement.
    ///
    /// The returned entities are in input order. An empty input returns an
    /// empty vector without touching the store. A unique violation on any row
    /// fails the whole batch.
    async fn bulk_create(&self, data: Vec<M::Create>) -> Result<Vec<M>, AppError>;

    /// Updates the entity only if `guard.0` currently equals `guard.1`.
    ///
    /// Returns `Ok(None)` when the entity is missing or the guard does not hold.
    async fn compare_and_update(
        &self,
        id: i64,
        guard: (&'static str, Value),
        data: M::Update,
    ) -> Result<Option<M>, AppError>;
}
