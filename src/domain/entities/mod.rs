//! Core domain entities representing the business data model.
//!
//! Every entity carries an `i64` primary key and `created_at`/`updated_at`
//! timestamps, and implements [`crate::domain::crud::Model`] so the generic
//! stores can persist it.
//!
//! # Entity Types
//!
//! - [`User`] - An account with a role set
//! - [`Item`] - Something a user owns and sells
//! - [`Order`] / [`OrderItem`] - An order and its lines
//! - [`ApiKey`] - A per-user key for programmatic access
//!
//! # Design Pattern
//!
//! Entities have separate structs for creation (`NewUser`, `NewItem`, ...),
//! partial updates (`UserPatch`, `ItemPatch`, ...) and equality filters
//! (`UserFilter`, `ItemFilter`, ...).

pub mod api_key;
pub mod item;
pub mod order;
pub mod user;

pub use api_key::{ApiKey, ApiKeyFilter, ApiKeyPatch, NewApiKey};
pub use item::{Item, ItemFilter, ItemPatch, NewItem};
pub use order::{
    MAX_QUANTITY, MIN_QUANTITY, NewOrder, NewOrderItem, Order, OrderCounts, OrderFilter, OrderItem,
    OrderItemFilter, OrderItemPatch, OrderLine, OrderPatch, OrderStatus, OrderWithItems,
    PricedLine,
};
pub use user::{NewUser, Role, User, UserFilter, UserPatch};
