//! Application layer services implementing business logic.
//!
//! This layer orchestrates domain operations by coordinating repository calls,
//! validation, permission checks and business rules. Services consume
//! repository traits and provide a clean API for HTTP handlers, the task
//! handler and the admin CLI.
//!
//! # Available Services
//!
//! - [`services::UserService`] - Registration, profiles and credential checks
//! - [`services::AuthService`] - Access tokens and API keys
//! - [`services::ItemService`] - Items with cached reads
//! - [`services::OrderService`] - Order placement and status transitions
//!
//! Supporting modules: [`security`] (Argon2, JWT, HMAC digests),
//! [`permissions`] (role checks), [`memoize`] (read-through cache) and
//! [`tasks`] (background task execution).

pub mod memoize;
pub mod permissions;
pub mod security;
pub mod services;
pub mod tasks;
