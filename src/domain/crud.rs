//! Generic CRUD model shared by every persisted entity.
//!
//! A [`Model`] describes one table: its columns, the columns that must be
//! unique, and the payload types used to create, update and filter rows.
//! Payloads expose their contents as `(column, Value)` pairs through
//! [`Columns`], which is all the generic stores need:
//!
//! - [`crate::infrastructure::persistence::PgCrud`] turns them into SQL
//! - [`crate::infrastructure::persistence::MemoryCrud`] applies them in memory
//!
//! # Payload conventions
//!
//! - `Create::columns` lists every insertable column, using [`Value::Null`] for absent optionals
//! - `Update::columns` lists only the columns being changed (partial update)
//! - `Filter::columns` lists equality conditions; [`Value::Null`] means `IS NULL`

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A column value carried by payloads and filters.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Decimal(Decimal),
    Timestamp(DateTime<Utc>),
    TextArray(Vec<String>),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::TextArray(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Exposes a payload as column/value pairs.
pub trait Columns {
    fn columns(&self) -> Vec<(&'static str, Value)>;
}

/// Describes a persisted entity and its payload types.
pub trait Model: Clone + Send + Sync + Unpin + 'static {
    /// Table name.
    const TABLE: &'static str;
    /// Columns selected and returned for this entity.
    const COLUMNS: &'static [&'static str];
    /// Columns with a uniqueness constraint.
    const UNIQUE: &'static [&'static str] = &[];

    type Create: Columns + Clone + Send + Sync + 'static;
    type Update: Columns + Clone + Send + Sync + 'static;
    type Filter: Columns + Default + Clone + Send + Sync + 'static;

    fn id(&self) -> i64;

    /// Current value of a column, used for filtering and uniqueness checks.
    fn value(&self, column: &str) -> Value;

    /// Builds the entity a store persists for `data`.
    fn build(id: i64, now: DateTime<Utc>, data: Self::Create) -> Self;

    /// Applies a partial update and bumps `updated_at`.
    fn apply(&mut self, data: Self::Update, now: DateTime<Utc>);
}

/// Offset pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub skip: i64,
    pub limit: i64,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: i64 = 100;
    pub const MAX_LIMIT: i64 = 1000;

    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, Self::DEFAULT_LIMIT)
    }
}

/// One page of entities plus the number of rows matching the filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

/// Looks up a column in a payload.
pub fn column_value<'a>(columns: &'a [(&'static str, Value)], name: &str) -> Option<&'a Value> {
    columns.iter().find(|(c, _)| *c == name).map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_into_value() {
        let some: Value = Some("x".to_string()).into();
        let none: Value = Option::<String>::None.into();
        assert_eq!(some, Value::Text("x".to_string()));
        assert_eq!(none, Value::Null);
    }

    #[test]
    fn test_column_value_lookup() {
        let columns = vec![("email", Value::from("a@b.c")), ("is_active", true.into())];
        assert_eq!(column_value(&columns, "is_active"), Some(&Value::Bool(true)));
        assert!(column_value(&columns, "roles").is_none());
    }

    #[test]
    fn test_page_map_keeps_total() {
        let page = Page {
            items: vec![1, 2, 3],
            total: 15,
        };
        let mapped = page.map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20, 30]);
        assert_eq!(mapped.total, 15);
    }

    #[test]
    fn test_default_page_request() {
        let page = PageRequest::default();
        assert_eq!(page.skip, 0);
        assert_eq!(page.limit, 100);
    }
}
