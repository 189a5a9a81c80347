//! HTTP request handlers for API endpoints.
//!
//! Each handler module corresponds to a logical grouping of endpoints.

pub mod auth;
pub mod health;
pub mod items;
pub mod metrics;
pub mod orders;
pub mod users;

pub use auth::{
    create_api_key_handler, list_api_keys_handler, login_handler, register_handler,
    revoke_api_key_handler,
};
pub use health::health_handler;
pub use items::{
    bulk_items_handler, create_item_handler, get_item_handler, list_items_handler,
    update_item_handler,
};
pub use metrics::metrics_handler;
pub use orders::{
    cancel_order_handler, create_order_handler, get_order_handler, list_orders_handler,
    process_order_handler,
};
pub use users::{
    bulk_users_handler, get_user_handler, list_users_handler, me_handler, update_me_handler,
    update_user_handler,
};
