//! User entity and role set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::crud::{Columns, Model, Value};

/// A role granting a set of permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Converts roles to their stored text form.
pub fn roles_to_strings(roles: &[Role]) -> Vec<String> {
    roles.iter().map(|r| r.as_str().to_string()).collect()
}

/// Parses stored role names, skipping unknown ones.
pub fn roles_from_strings(roles: &[String]) -> Vec<Role> {
    roles.iter().filter_map(|r| r.parse().ok()).collect()
}

/// A registered account.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::Admin)
    }
}

/// Input data for creating a user. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub hashed_password: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub roles: Vec<Role>,
}

/// Partial update for a user.
///
/// `None` fields are left unchanged. `full_name: Some(None)` clears the name.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub full_name: Option<Option<String>>,
    pub hashed_password: Option<String>,
    pub is_active: Option<bool>,
    pub roles: Option<Vec<Role>>,
}

/// Equality filters for listing users.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

impl Columns for NewUser {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("email", self.email.clone().into()),
            ("hashed_password", self.hashed_password.clone().into()),
            ("full_name", self.full_name.clone().into()),
            ("is_active", self.is_active.into()),
            ("roles", roles_to_strings(&self.roles).into()),
        ]
    }
}

impl Columns for UserPatch {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        let mut columns = Vec::new();
        if let Some(full_name) = &self.full_name {
            columns.push(("full_name", full_name.clone().into()));
        }
        if let Some(hashed_password) = &self.hashed_password {
            columns.push(("hashed_password", hashed_password.clone().into()));
        }
        if let Some(is_active) = self.is_active {
            columns.push(("is_active", is_active.into()));
        }
        if let Some(roles) = &self.roles {
            columns.push(("roles", roles_to_strings(roles).into()));
        }
        columns
    }
}

impl Columns for UserFilter {
    fn columns(&self) -> Vec<(&'static str, Value)> {
        let mut columns = Vec::new();
        if let Some(email) = &self.email {
            columns.push(("email", email.clone().into()));
        }
        if let Some(is_active) = self.is_active {
            columns.push(("is_active", is_active.into()));
        }
        columns
    }
}

impl Model for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "email",
        "hashed_password",
        "full_name",
        "is_active",
        "roles",
        "created_at",
        "updated_at",
    ];
    const UNIQUE: &'static [&'static str] = &["email"];

    type Create = NewUser;
    type Update = UserPatch;
    type Filter = UserFilter;

    fn id(&self) -> i64 {
        self.id
    }

    fn value(&self, column: &str) -> Value {
        match column {
            "id" => self.id.into(),
            "email" => self.email.clone().into(),
            "hashed_password" => self.hashed_password.clone().into(),
            "full_name" => self.full_name.clone().into(),
            "is_active" => self.is_active.into(),
            "roles" => roles_to_strings(&self.roles).into(),
            "created_at" => self.created_at.into(),
            "updated_at" => self.updated_at.into(),
            _ => Value::Null,
        }
    }

    fn build(id: i64, now: DateTime<Utc>, data: NewUser) -> Self {
        Self {
            id,
            email: data.email,
            hashed_password: data.hashed_password,
            full_name: data.full_name,
            is_active: data.is_active,
            roles: data.roles,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, data: UserPatch, now: DateTime<Utc>) {
        if let Some(full_name) = data.full_name {
            self.full_name = full_name;
        }
        if let Some(hashed_password) = data.hashed_password {
            self.hashed_password = hashed_password;
        }
        if let Some(is_active) = data.is_active {
            self.is_active = is_active;
        }
        if let Some(roles) = data.roles {
            self.roles = roles;
        }
        self.updated_at = now;
    }
}
