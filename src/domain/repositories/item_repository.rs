//! Repository trait for items.

use crate::domain::crud::{Page, PageRequest};
use crate::domain::entities::{Item, ItemFilter, ItemPatch, NewItem};
use crate::domain::repositories::CrudRepository;
use crate::error::AppError;
use async_trait::async_trait;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemRepository: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<Item>, AppError>;

    /// Fetches the items with the given ids, ordered by id. Unknown ids are skipped.
    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Item>, AppError>;

    async fn list(&self, page: PageRequest, filter: ItemFilter) -> Result<Page<Item>, AppError>;

    async fn create(&self, new_item: NewItem) -> Result<Item, AppError>;

    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the item does not exist.
    async fn update(&self, id: i64, patch: ItemPatch) -> Result<Item, AppError>;

    async fn bulk_create(&self, items: Vec<NewItem>) -> Result<Vec<Item>, AppError>;
}

#[async_trait]
impl<C> ItemRepository for C
where
    C: CrudRepository<Item>,
{
    async fn get(&self, id: i64) -> Result<Option<Item>, AppError> {
        CrudRepository::<Item>::get(self, id).await
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<Item>, AppError> {
        CrudRepository::<Item>::get_many(self, ids).await
    }

    async fn list(&self, page: PageRequest, filter: ItemFilter) -> Result<Page<Item>, AppError> {
        self.get_multi(page, filter).await
    }

    async fn create(&self, new_item: NewItem) -> Result<Item, AppError> {
        CrudRepository::<Item>::create(self, new_item).await
    }

    async fn update(&self, id: i64, patch: ItemPatch) -> Result<Item, AppError> {
        CrudRepository::<Item>::update(self, id, patch).await
    }

    async fn bulk_create(&self, items: Vec<NewItem>) -> Result<Vec<Item>, AppError> {
        CrudRepository::<Item>::bulk_create(self, items).await
    }
}
