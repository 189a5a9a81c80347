//! Business logic services for the application layer.

pub mod auth_service;
pub mod item_service;
pub mod order_service;
pub mod user_service;

pub use auth_service::{AuthService, CreatedApiKey};
pub use item_service::{ItemDraft, ItemService};
pub use order_service::OrderService;
pub use user_service::{ProfileUpdate, Registration, UserService};
