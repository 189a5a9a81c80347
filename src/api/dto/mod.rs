//! Request and response bodies for the HTTP API.

pub mod auth;
pub mod health;
pub mod item;
pub mod order;
pub mod pagination;
pub mod user;

pub use auth::{
    ApiKeyCreatedResponse, CreateApiKeyRequest, LoginRequest, RegisterRequest, TokenResponse,
};
pub use health::{CheckStatus, HealthChecks, HealthResponse};
pub use item::{BulkItemsRequest, CreateItemRequest, ItemListQuery, ItemResponse, UpdateItemRequest};
pub use order::{
    CreateOrderRequest, OrderItemResponse, OrderLineRequest, OrderListQuery, OrderResponse,
    ProcessOrderResponse,
};
pub use pagination::{PageResponse, PaginationParams};
pub use user::{
    AdminUpdateUserRequest, BulkUsersRequest, UpdateMeRequest, UserListQuery, UserResponse,
};
