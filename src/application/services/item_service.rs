//! Item management with cached reads.

use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;

use crate::application::memoize::Memoizer;
use crate::application::permissions::require_owner_or_admin;
use crate::domain::crud::{Page, PageRequest};
use crate::domain::entities::{Item, ItemFilter, ItemPatch, NewItem, User};
use crate::domain::repositories::ItemRepository;
use crate::error::AppError;

const GET_ITEM: &str = "get_item";
const LIST_ITEMS: &str = "list_items";

/// Item fields supplied by a client; the owner comes from the caller.
#[derive(Debug, Clone)]
pub struct ItemDraft {
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
}

pub struct ItemService<R: ?Sized + ItemRepository = dyn ItemRepository> {
    repository: Arc<R>,
    memo: Memoizer,
}

impl<R: ?Sized + ItemRepository> ItemService<R> {
    pub fn new(repository: Arc<R>, memo: Memoizer) -> Self {
        Self { repository, memo }
    }

    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the price is not positive.
    pub async fn create(&self, owner: &User, draft: ItemDraft) -> Result<Item, AppError> {
        let new_item = to_new_item(owner, draft)?;
        self.repository.create(new_item).await
    }

    /// Creates every item in one batch, owned by `owner`, in input order.
    pub async fn bulk_create(&self, owner: &User, drafts: Vec<ItemDraft>) -> Result<Vec<Item>, AppError> {
        let new_items = drafts
            .into_iter()
            .map(|draft| to_new_item(owner, draft))
            .collect::<Result<Vec<_>, _>>()?;

        self.repository.bulk_create(new_items).await
    }

    /// Fetches an item, served from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the item does not exist.
    pub async fn get(&self, id: i64) -> Result<Item, AppError> {
        self.memo
            .get_or_compute(GET_ITEM, &(id,), || self.fetch(id))
            .await
    }

    /// Lists items, optionally filtered by owner. Pages are cached for the TTL.
    pub async fn list(&self, page: PageRequest, filter: ItemFilter) -> Result<Page<Item>, AppError> {
        let args = (page.skip, page.limit, filter.owner_id);
        self.memo
            .get_or_compute(LIST_ITEMS, &args, || self.repository.list(page, filter))
            .await
    }

    /// Applies a partial update. Only the owner or an admin may update an item.
    ///
    /// The cached single-item entry is invalidated; cached list pages expire
    /// on their own.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the item does not exist and
    /// [`AppError::Forbidden`] if `actor` may not modify it.
    pub async fn update(&self, actor: &User, id: i64, patch: ItemPatch) -> Result<Item, AppError> {
        let current = self.fetch(id).await?;
        require_owner_or_admin(actor, current.owner_id, "item")?;

        if let Some(price) = patch.price {
            validate_price(price)?;
        }

        let updated = self.repository.update(id, patch).await?;
        self.memo.invalidate(GET_ITEM, &(id,)).await;

        Ok(updated)
    }

    async fn fetch(&self, id: i64) -> Result<Item, AppError> {
        self.repository
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found("Item not found", json!({ "id": id })))
    }
}

fn to_new_item(owner: &User, draft: ItemDraft) -> Result<NewItem, AppError> {
    validate_price(draft.price)?;
    Ok(NewItem {
        title: draft.title,
        description: draft.description,
        price: draft.price,
        owner_id: owner.id,
    })
}

fn validate_price(price: Decimal) -> Result<(), AppError> {
    if price <= Decimal::ZERO {
        return Err(AppError::validation(
            "Price must be greater than zero",
            json!({ "price": price.to_string() }),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::permissions::test_user;
    use crate::domain::entities::Role;
    use crate::domain::repositories::MockItemRepository;
    use crate::infrastructure::cache::MemoryCache;
    use chrono::Utc;

    fn memo() -> Memoizer {
        Memoizer::new(Arc::new(MemoryCache::new(60)), 60)
    }

    fn item(id: i64, owner_id: i64) -> Item {
        let now = Utc::now();
        Item {
            id,
            title: "Lamp".to_string(),
            description: None,
            price: Decimal::new(1999, 2),
            owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn draft(price: Decimal) -> ItemDraft {
        ItemDraft {
            title: "Lamp".to_string(),
            description: None,
            price,
        }
    }

    #[tokio::test]
    async fn test_get_is_cached() {
        let mut repo = MockItemRepository::new();
        repo.expect_get()
            .times(1)
            .returning(|id| Ok(Some(item(id, 1))));

        let service = ItemService::new(Arc::new(repo), memo());

        assert_eq!(service.get(5).await.unwrap().id, 5);
        assert_eq!(service.get(5).await.unwrap().id, 5);
    }

    #[tokio::test]
    async fn test_get_missing_item_is_not_found() {
        let mut repo = MockItemRepository::new();
        repo.expect_get().times(2).returning(|_| Ok(None));

        let service = ItemService::new(Arc::new(repo), memo());

        assert!(matches!(service.get(5).await, Err(AppError::NotFound { .. })));
        assert!(matches!(service.get(5).await, Err(AppError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_create_sets_owner_and_rejects_free_items() {
        let mut repo = MockItemRepository::new();
        repo.expect_create()
            .withf(|new_item| new_item.owner_id == 4)
            .times(1)
            .returning(|new_item| Ok(item(1, new_item.owner_id)));

        let service = ItemService::new(Arc::new(repo), memo());
        let owner = test_user(4, vec![Role::User]);

        assert!(service.create(&owner, draft(Decimal::new(500, 2))).await.is_ok());
        assert!(matches!(
            service.create(&owner, draft(Decimal::ZERO)).await,
            Err(AppError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_by_stranger_is_forbidden() {
        let mut repo = MockItemRepository::new();
        repo.expect_get().returning(|id| Ok(Some(item(id, 1))));
        repo.expect_update().never();

        let service = ItemService::new(Arc::new(repo), memo());
        let stranger = test_user(2, vec![Role::User]);

        let result = service.update(&stranger, 9, ItemPatch::default()).await;
        assert!(matches!(result, Err(AppError::Forbidden { .. })));
    }

    #[tokio::test]
    async fn test_update_invalidates_cached_item() {
        let mut repo = MockItemRepository::new();
        repo.expect_get().times(3).returning(|id| Ok(Some(item(id, 1))));
        repo.expect_update().times(1).returning(|id, patch| {
            let mut updated = item(id, 1);
            if let Some(title) = patch.title {
                updated.title = title;
            }
            Ok(updated)
        });

        let service = ItemService::new(Arc::new(repo), memo());
        let owner = test_user(1, vec![Role::User]);

        // Warm the cache, update, then read again through the repository.
        service.get(9).await.unwrap();
        let patch = ItemPatch {
            title: Some("Desk lamp".to_string()),
            ..Default::default()
        };
        service.update(&owner, 9, patch).await.unwrap();
        service.get(9).await.unwrap();
    }

    #[tokio::test]
    async fn test_admin_may_update_any_item() {
        let mut repo = MockItemRepository::new();
        repo.expect_get().returning(|id| Ok(Some(item(id, 1))));
        repo.expect_update().times(1).returning(|id, _| Ok(item(id, 1)));

        let service = ItemService::new(Arc::new(repo), memo());
        let admin = test_user(2, vec![Role::User, Role::Admin]);

        assert!(service.update(&admin, 9, ItemPatch::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_bulk_create_validates_every_draft_first() {
        let mut repo = MockItemRepository::new();
        repo.expect_bulk_create().never();

        let service = ItemService::new(Arc::new(repo), memo());
        let owner = test_user(1, vec![Role::User]);

        let result = service
            .bulk_create(&owner, vec![draft(Decimal::ONE), draft(Decimal::NEGATIVE_ONE)])
            .await;
        assert!(matches!(result, Err(AppError::Validation { .. })));
    }
}
