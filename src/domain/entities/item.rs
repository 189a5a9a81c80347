//! Item entity: something a user owns and can put into orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::crud::{Columns, Model, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input data for creating an item.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub title: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub owner_id: i64,
}

/// Partial update for an item. `description: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct ItemPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub owner_id: Option<i64>,
}

impl Columns for NewItem {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("title", self.title.clone().into()),
            ("description", self.description.clone().into()),
            ("price", self.price.into()),
            ("owner_id", self.owner_id.into()),
        ]
    }
}

impl Columns for ItemPatch {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        let mut columns = Vec::new();
        if let Some(title) = &self.title {
            columns.push(("title", title.clone().into()));
        }
        if let Some(description) = &self.description {
            columns.push(("description", description.clone().into()));
        }
        if let Some(price) = self.price {
            columns.push(("price", price.into()));
        }
        columns
    }
}

impl Columns for ItemFilter {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        self.owner_id
            .map(|owner_id| vec![("owner_id", owner_id.into())])
            .unwrap_or_default()
    }
}

impl Model for Item {
    const TABLE: &'static str = "items";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "description",
        "price",
        "owner_id",
        "created_at",
        "updated_at",
    ];

    type Create = NewItem;
    type Update = ItemPatch;
    type Filter = ItemFilter;

    fn id(&self) -> i64 {
        self.id
    }

    fn value(&self, column: &str) -> Value {
        match column {
            "id" => self.id.into(),
            "title" => self.title.clone().into(),
            "description" => self.description.clone().into(),
            "price" => self.price.into(),
            "owner_id" => self.owner_id.into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => Value::Null,
        }
    }

    fn build(id: i64, now: DateTime<Utc>, data: NewItem) -> Self {
        Self {
            id,
            title: data.title,
            description: data.description,
            price: data.price,
            owner_id: data.owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, data: ItemPatch, now: DateTime<Utc>) {
        if let Some(title) = data.title {
            self.title = title;
        }
        if let Some(description) = data.description {
            self.description = description;
        }
        if let Some(price) = data.price {
            self.price = price;
        }
        self.updated_at = now;
    }
}
