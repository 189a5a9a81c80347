//! Repository trait for user accounts.

use crate::domain::crud::{Page, PageRequest};
use crate::domain::entities::{NewUser, User, UserFilter, UserPatch};
use crate::domain::repositories::CrudRepository;
use crate::error::AppError;
use async_trait::async_trait;

/// Repository interface for user accounts.
///
/// Every [`CrudRepository<User>`] is a `UserRepository`; the trait exists so
/// services can be tested against a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<User>, AppError>;

    /// Finds a user by email. Emails are stored lowercased.
    async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn list(&self, page: PageRequest, filter: UserFilter) -> Result<Page<User>, AppError>;

    async fn count(&self, filter: UserFilter) -> Result<i64, AppError>;

    /// # Errors
    ///
    /// Returns [`AppError::Conflict`] if the email is already registered.
    async fn create(&self, new_user: NewUser) -> Result<User, AppError>;

    async fn update(&self, id: i64, patch: UserPatch) -> Result<User, AppError>;

    async fn bulk_create(&self, users: Vec<NewUser>) -> Result<Vec<User>, AppError>;
}

#[async_trait]
impl<C> UserRepository for C
where
    C: CrudRepository<User>,
{
    async fn get(&self, id: i64) -> Result<Option<User>, AppError> {
        CrudRepository::<User>::get(self, id).await
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let filter = UserFilter {
            email: Some(email.to_string()),
            ..Default::default()
        };
        let page = self.get_multi(PageRequest::new(0, 1), filter).await?;
        Ok(page.items.into_iter().next())
    }

    async fn list(&self, page: PageRequest, filter: UserFilter) -> Result<Page<User>, AppError> {
        self.get_multi(page, filter).await
    }

    async fn count(&self, filter: UserFilter) -> Result<i64, AppError> {
        CrudRepository::<User>::count(self, filter).await
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        CrudRepository::<User>::create(self, new_user).await
    }

    async fn update(&self, id: i64, patch: UserPatch) -> Result<User, AppError> {
        CrudRepository::<User>::update(self, id, patch).await
    }

    async fn bulk_create(&self, users: Vec<NewUser>) -> Result<Vec<User>, AppError> {
        CrudRepository::<User>::bulk_create(self, users).await
    }
}
