//! Repository trait for API keys.

use crate::domain::crud::{PageRequest, Value};
use crate::domain::entities::{ApiKey, ApiKeyFilter, ApiKeyPatch, NewApiKey};
use crate::domain::repositories::CrudRepository;
use crate::error::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Repository interface for API key management.
///
/// Keys are looked up by their HMAC-SHA256 digest; raw keys are never stored.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the digest already exists.
    async fn create(&self, new_key: NewApiKey) -> Result<ApiKey, AppError>;

    async fn get(&self, id: i64) -> Result<Option<ApiKey>, AppError>;

    /// Finds a key that matches `key_hash` and has not been revoked.
    async fn find_active_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError>;

    /// Records the time a key was last used.
    async fn touch(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError>;

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<ApiKey>, AppError>;

    /// Marks a key revoked at `at`.
    ///
    /// Returns `None` if the key does not exist or was already revoked.
    async fn revoke(&self, id: i64, at: DateTime<Utc>) -> Result<Option<ApiKey>, AppError>;
}

#[async_trait]
impl<C> ApiKeyRepository for C
where
    C: CrudRepository<ApiKey>,
{
    async fn create(&self, new_key: NewApiKey) -> Result<ApiKey, AppError> {
        CrudRepository::<ApiKey>::create(self, new_key).await
    }

    async fn get(&self, id: i64) -> Result<Option<ApiKey>, AppError> {
        CrudRepository::<ApiKey>::get(self, id).await
    }

    async fn find_active_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, AppError> {
        let filter = ApiKeyFilter {
            key_hash: Some(key_hash.to_string()),
            active_only: true,
            ..Default::default()
        };
        let page = self.get_multi(PageRequest::new(0, 1), filter).await?;
        Ok(page.items.into_iter().next())
    }

    async fn touch(&self, id: i64, at: DateTime<Utc>) -> Result<(), AppError> {
        let patch = ApiKeyPatch {
            last_used_at: Some(at),
            ..Default::default()
        };
        CrudRepository::<ApiKey>::update(self, id, patch).await.map(|_| ())
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<ApiKey>, AppError> {
        let filter = ApiKeyFilter {
            user_id: Some(user_id),
            ..Default::default()
        };
        let page = self
            .get_multi(PageRequest::new(0, PageRequest::MAX_LIMIT), filter)
            .await?;
        Ok(page.items)
    }

    async fn revoke(&self, id: i64, at: DateTime<Utc>) -> Result<Option<ApiKey>, AppError> {
        let patch = ApiKeyPatch {
            revoked_at: Some(at),
            ..Default::default()
        };
        self.compare_and_update(id, ("revoked_at", Value::Null), patch)
            .await
    }
}
