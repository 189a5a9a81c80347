//! DTOs for item endpoints.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use validator::{Validate, ValidationError};

use crate::api::dto::pagination::PaginationParams;
use crate::application::services::ItemDraft;
use crate::domain::entities::{Item, ItemFilter, ItemPatch};

fn positive_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price <= Decimal::ZERO {
        let mut error = ValidationError::new("positive_price");
        error.message = Some("Price must be greater than zero".into());
        return Err(error);
    }
    Ok(())
}

/// Request body for `POST /items`. Prices are decimal strings, e.g. `"19.99"`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(custom(function = "positive_price"))]
    pub price: Decimal,
}

impl From<CreateItemRequest> for ItemDraft {
    fn from(request: CreateItemRequest) -> Self {
        Self {
            title: request.title,
            description: request.description,
            price: request.price,
        }
    }
}

/// Request body for `PATCH /items/{id}`. Absent fields are left unchanged;
/// `"description": null` clears the description.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateItemRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[serde(default, with = "::serde_with::rust::double_option")]
    #[validate(length(max = 2000))]
    pub description: Option<Option<String>>,

    #[validate(custom(function = "positive_price"))]
    pub price: Option<Decimal>,
}

impl From<UpdateItemRequest> for ItemPatch {
    fn from(request: UpdateItemRequest) -> Self {
        Self {
            title: request.title,
            description: request.description,
            price: request.price,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct BulkItemsRequest {
    #[validate(length(min = 1, max = 1000), nested)]
    pub items: Vec<CreateItemRequest>,
}

#[derive(Debug, Serialize)]
pub struct ItemResponse {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Item> for ItemResponse {
    fn from(item: Item) -> Self {
        Self {
            id: item.id,
            title: item.title,
            description: item.description,
            price: item.price,
            owner_id: item.owner_id,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

#[serde_as]
#[derive(Debug, Deserialize)]
pub struct ItemListQuery {
    #[serde(flatten)]
    pub pagination: PaginationParams,

    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default)]
    pub owner_id: Option<i64>,
}

impl ItemListQuery {
    pub fn filter(&self) -> ItemFilter {
        ItemFilter {
            owner_id: self.owner_id,
        }
    }
}
