//! API key entity.

use chrono::{DateTime, Utc};

use crate::domain::crud::{Columns, Model, Value};

/// A per-user API key.
///
/// Only the HMAC-SHA256 digest of the raw key is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiKey {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub key_hash: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApiKey {
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub user_id: i64,
    pub name: String,
    pub key_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct ApiKeyPatch {
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ApiKeyFilter {
    pub user_id: Option<i64>,
    pub key_hash: Option<String>,
    /// Restricts results to keys that have not been revoked.
    pub active_only: bool,
}

impl Columns for NewApiKey {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("user_id", self.user_id.into()),
            ("name", self.name.clone().into()),
            ("key_hash", self.key_hash.clone().into()),
        ]
    }
}

impl Columns for ApiKeyPatch {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        let mut columns = Vec::new();
        if let Some(last_used_at) = self.last_used_at {
            columns.push(("last_used_at", last_used_at.into()));
        }
        if let Some(revoked_at) = self.revoked_at {
            columns.push(("revoked_at", revoked_at.into()));
        }
        columns
    }
}

impl Columns for ApiKeyFilter {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        let mut columns = Vec::new();
        if let Some(user_id) = self.user_id {
            columns.push(("user_id", user_id.into()));
        }
        if let Some(key_hash) = &self.key_hash {
            columns.push(("key_hash", key_hash.clone().into()));
        }
        if self.active_only {
            columns.push(("revoked_at", Value::Null));
        }
        columns
    }
}

impl Model for ApiKey {
    const TABLE: &'static str = "api_keys";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "user_id",
        "name",
        "key_hash",
        "last_used_at",
        "revoked_at",
        "created_at",
        "updated_at",
    ];
    const UNIQUE: &'static [&'static str] = &["key_hash"];

    type Create = NewApiKey;
    type Update = ApiKeyPatch;
    type Filter = ApiKeyFilter;

    fn id(&self) -> i64 {
        self.id
    }

    fn value(&self, column: &str) -> Value {
        match column {
            "id" => self.id.into(),
            "user_id" => self.user_id.into(),
            "name" => self.name.clone().into(),
            "key_hash" => self.key_hash.clone().into(),
            "last_used_at" => self.last_used_at.into(),
            "revoked_at" => self.revoked_at.into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => Value::Null,
        }
    }

    fn build(id: i64, now: DateTime<Utc>, data: NewApiKey) -> Self {
        Self {
            id,
            user_id: data.user_id,
            name: data.name,
            key_hash: data.key_hash,
            last_used_at: None,
            revoked_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, data: ApiKeyPatch, now: DateTime<Utc>) {
        if let Some(last_used_at) = data.last_used_at {
            self.last_used_at = Some(last_used_at);
        }
        if let Some(revoked_at) = data.revoked_at {
            self.revoked_at = Some(revoked_at);
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_filter_matches_unrevoked_key() {
        let key = ApiKey::build(
            1,
            Utc::now(),
            NewApiKey {
                user_id: 9,
                name: "ci".to_string(),
                key_hash: "abc".to_string(),
            },
        );

        let filter = ApiKeyFilter {
            key_hash: Some("abc".to_string()),
            active_only: true,
            ..Default::default()
        };

        for (column, value) in filter.columns() {
            assert_eq!(key.value(column), value);
        }
        assert!(!key.is_revoked());
    }
}
