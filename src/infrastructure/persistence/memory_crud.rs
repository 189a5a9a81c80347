//! In-process implementation of the generic CRUD repository.
//!
//! Used when `DATABASE_URL=memory://` and by the HTTP tests. Behaves like the
//! PostgreSQL store for everything the services rely on: ids are assigned in
//! insertion order, unique columns are enforced, and bulk inserts are
//! all-or-nothing.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::crud::{Columns, Model, Page, PageRequest, Value, column_value};
use crate::domain::repositories::CrudRepository;
use crate::error::AppError;

pub struct MemoryCrud<M> {
    rows: RwLock<BTreeMap<i64, M>>,
    next_id: AtomicI64,
}

impl<M: Model> Default for MemoryCrud<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Model> MemoryCrud<M> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<i64, M>>, AppError> {
        self.rows
            .read()
            .map_err(|_| AppError::internal("In-memory store lock poisoned", json!({})))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<i64, M>>, AppError> {
        self.rows
            .write()
            .map_err(|_| AppError::internal("In-memory store lock poisoned", json!({})))
    }

    fn matches(row: &M, filter: &[(&'static str, Value)]) -> bool {
        filter
            .iter()
            .all(|(column, value)| row.value(column) == *value)
    }

    /// Rejects `columns` if one of the model's unique columns collides with
    /// a stored row other than `except`.
    fn check_unique(
        rows: &BTreeMap<i64, M>,
        columns: &[(&'static str, Value)],
        except: Option<i64>,
    ) -> Result<(), AppError> {
        for unique in M::UNIQUE {
            let Some(value) = column_value(columns, unique) else {
                continue;
            };
            if *value == Value::Null {
                continue;
            }
            let taken = rows
                .values()
                .any(|row| Some(row.id()) != except && row.value(unique) == *value);
            if taken {
                return Err(unique_violation::<M>(unique));
            }
        }
        Ok(())
    }

    /// Inserts a batch atomically. Either every row is stored or none is.
    fn insert_all(&self, data: Vec<M::Create>) -> Result<Vec<M>, AppError> {
        self.lock()?.insert_all(data)
    }

    /// Takes the table's write lock for a change spanning several statements.
    pub fn lock(&self) -> Result<MemoryTable<'_, M>, AppError> {
        Ok(MemoryTable {
            rows: self.write()?,
            next_id: &self.next_id,
        })
    }

    fn apply_update(
        rows: &mut BTreeMap<i64, M>,
        id: i64,
        data: M::Update,
    ) -> Result<Option<M>, AppError> {
        Self::check_unique(rows, &data.columns(), Some(id))?;
        let Some(row) = rows.get_mut(&id) else {
            return Ok(None);
        };
        row.apply(data, Utc::now());
        Ok(Some(row.clone()))
    }

    /// Every row matching `filter`, ordered by id, without paging.
    pub fn find_all(&self, filter: &M::Filter) -> Result<Vec<M>, AppError> {
        let filter = filter.columns();
        let rows = self.read()?;
        Ok(rows
            .values()
            .filter(|row| Self::matches(row, &filter))
            .cloned()
            .collect())
    }

    /// Applies `data` to every row satisfying `predicate` and returns how many changed.
    pub fn update_matching(
        &self,
        predicate: impl Fn(&M) -> bool,
        data: M::Update,
    ) -> Result<u64, AppError> {
        let mut rows = self.write()?;
        let now = Utc::now();
        let mut changed = 0;
        for row in rows.values_mut().filter(|row| predicate(row)) {
            row.apply(data.clone(), now);
            changed += 1;
        }
        Ok(changed)
    }
}

/// A write-locked [`MemoryCrud`] table.
///
/// Nothing written through it is visible to other callers until it drops,
/// so holding two of these gives a multi-table transaction.
pub struct MemoryTable<'a, M> {
    rows: RwLockWriteGuard<'a, BTreeMap<i64, M>>,
    next_id: &'a AtomicI64,
}

impl<M: Model> MemoryTable<'_, M> {
    /// Inserts a batch. Either every row is stored or none is.
    pub fn insert_all(&mut self, data: Vec<M::Create>) -> Result<Vec<M>, AppError> {
        let mut seen: Vec<(&'static str, Value)> = Vec::new();
        for payload in &data {
            let columns = payload.columns();
            MemoryCrud::<M>::check_unique(&self.rows, &columns, None)?;
            for unique in M::UNIQUE {
                if let Some(value) = column_value(&columns, unique) {
                    if *value == Value::Null {
                        continue;
                    }
                    if seen.iter().any(|(c, v)| c == unique && v == value) {
                        return Err(unique_violation::<M>(unique));
                    }
                    seen.push((unique, value.clone()));
                }
            }
        }

        let now = Utc::now();
        let created: Vec<M> = data
            .into_iter()
            .map(|payload| {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                M::build(id, now, payload)
            })
            .collect();

        for model in &created {
            self.rows.insert(model.id(), model.clone());
        }
        Ok(created)
    }

    pub fn insert(&mut self, data: M::Create) -> Result<M, AppError> {
        self.insert_all(vec![data])?
            .pop()
            .ok_or_else(|| AppError::internal("Insert returned no row", json!({})))
    }

    /// Drops a row written under this lock.
    pub fn remove(&mut self, id: i64) -> Option<M> {
        self.rows.remove(&id)
    }
}

fn unique_violation<M: Model>(column: &str) -> AppError {
    AppError::conflict(
        "Unique constraint violation",
        json!({ "constraint": format!("{}_{}_key", M::TABLE, column) }),
    )
}

#[async_trait]
impl<M: Model> CrudRepository<M> for MemoryCrud<M> {
    async fn get(&self, id: i64) -> Result<Option<M>, AppError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<M>, AppError> {
        let rows = self.read()?;
        Ok(rows
            .values()
            .filter(|row| ids.contains(&row.id()))
            .cloned()
            .collect())
    }

    async fn get_multi(&self, page: PageRequest, filter: M::Filter) -> Result<Page<M>, AppError> {
        let matching = self.find_all(&filter)?;
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.skip.max(0) as usize)
            .take(page.limit.max(0) as usize)
            .collect();
        Ok(Page { items, total })
    }

    async fn count(&self, filter: M::Filter) -> Result<i64, AppError> {
        Ok(self.find_all(&filter)?.len() as i64)
    }

    async fn create(&self, data: M::Create) -> Result<M, AppError> {
        self.lock()?.insert(data)
    }

    async fn update(&self, id: i64, data: M::Update) -> Result<M, AppError> {
        let mut rows = self.write()?;
        Self::apply_update(&mut rows, id, data)?.ok_or_else(|| {
            AppError::not_found(format!("{} row not found", M::TABLE), json!({ "id": id }))
        })
    }

    async fn bulk_create(&self, data: Vec<M::Create>) -> Result<Vec<M>, AppError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        self.insert_all(data)
    }

    async fn compare_and_update(
        &self,
        id: i64,
        guard: (&'static str, Value),
        data: M::Update,
    ) -> Result<Option<M>, AppError> {
        let mut rows = self.write()?;
        let (column, expected) = guard;
        let holds = rows
            .get(&id)
            .is_some_and(|row| row.value(column) == expected);
        if !holds {
            return Ok(None);
        }
        Self::apply_update(&mut rows, id, data)
    }
}
