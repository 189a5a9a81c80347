//! Repository trait definitions for the domain layer.
//!
//! These traits abstract data access following the Repository pattern and are
//! implemented in `crate::infrastructure::persistence`.
//!
//! # Available Repositories
//!
//! - [`CrudRepository`] - Generic CRUD base over any [`crate::domain::crud::Model`]
//! - [`UserRepository`] - User accounts
//! - [`ItemRepository`] - Items
//! - [`OrderRepository`] - Orders, lines and status transitions
//! - [`ApiKeyRepository`] - API key lookup
//!
//! `UserRepository`, `ItemRepository` and `ApiKeyRepository` are implemented
//! for every `CrudRepository` of the matching model, so the PostgreSQL and
//! in-memory stores get them for free. Mock implementations are generated via
//! `mockall` for testing.
//!
//! # Testing
//!
//! See integration tests in `tests/repository_*.rs` for usage examples.

pub mod api_key_repository;
pub mod crud_repository;
pub mod item_repository;
pub mod order_repository;
pub mod user_repository;

pub use api_key_repository::ApiKeyRepository;
pub use crud_repository::CrudRepository;
pub use item_repository::ItemRepository;
pub use order_repository::OrderRepository;
pub use user_repository::UserRepository;

#[cfg(test)]
pub use api_key_repository::MockApiKeyRepository;
#[cfg(test)]
pub use item_repository::MockItemRepository;
#[cfg(test)]
pub use order_repository::MockOrderRepository;
#[cfg(test)]
pub use user_repository::MockUserRepository;
