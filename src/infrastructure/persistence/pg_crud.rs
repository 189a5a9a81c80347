//! PostgreSQL implementation of the generic CRUD repository.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::query_builder::Separated;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::domain::crud::{Columns, Model, Page, PageRequest, Value};
use crate::domain::repositories::CrudRepository;
use crate::error::AppError;

/// Generic PostgreSQL store for one [`Model`].
///
/// Queries are assembled at runtime with [`QueryBuilder`]; every value is sent
/// as a bind parameter, only table and column names (which come from the
/// model's constants) are interpolated.
pub struct PgCrud<M> {
    pool: Arc<PgPool>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for PgCrud<M> {
    fn clone(&self) -> Self {
        Self {
            pool: Arc::clone(&self.pool),
            _model: PhantomData,
        }
    }
}

impl<M> PgCrud<M>
where
    M: Model + for<'r> FromRow<'r, PgRow>,
{
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self {
            pool,
            _model: PhantomData,
        }
    }

    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }

    fn select() -> String {
        format!("SELECT {} FROM {}", M::COLUMNS.join(", "), M::TABLE)
    }

    fn returning() -> String {
        format!(" RETURNING {}", M::COLUMNS.join(", "))
    }

    /// `INSERT ... VALUES (...), (...) RETURNING ...` for a non-empty batch.
    fn insert_query(rows: Vec<Vec<(&'static str, Value)>>) -> QueryBuilder<'static, Postgres> {
        let names: Vec<&str> = rows
            .first()
            .map(|row| row.iter().map(|(column, _)| *column).collect())
            .unwrap_or_default();

        let mut query = QueryBuilder::new(format!(
            "INSERT INTO {} ({}) ",
            M::TABLE,
            names.join(", ")
        ));
        query.push_values(rows, |mut values, row| {
            for (_, value) in row {
                push_separated(&mut values, value);
            }
        });
        query.push(Self::returning());
        query
    }

    fn update_query(
        id: i64,
        data: &M::Update,
        guard: Option<(&'static str, Value)>,
    ) -> QueryBuilder<'static, Postgres> {
        let mut query = QueryBuilder::new(format!("UPDATE {} SET ", M::TABLE));
        for (column, value) in data.columns() {
            query.push(column).push(" = ");
            push_value(&mut query, value);
            query.push(", ");
        }
        query.push("updated_at = NOW() WHERE id = ").push_bind(id);
        if let Some((column, value)) = guard {
            push_condition(&mut query, column, value);
        }
        query.push(Self::returning());
        query
    }

    /// Inserts one row on `conn`, which may belong to a transaction.
    pub async fn create_in(&self, conn: &mut PgConnection, data: M::Create) -> Result<M, AppError> {
        let mut query = Self::insert_query(vec![data.columns()]);
        let row = query.build_query_as::<M>().fetch_one(&mut *conn).await?;
        Ok(row)
    }

    /// Inserts a batch in one statement on `conn`.
    ///
    /// Rows are returned in input order.
    pub async fn bulk_create_in(
        &self,
        conn: &mut PgConnection,
        data: Vec<M::Create>,
    ) -> Result<Vec<M>, AppError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let rows = data.iter().map(Columns::columns).collect();
        let mut query = Self::insert_query(rows);
        let mut created = query.build_query_as::<M>().fetch_all(&mut *conn).await?;

        // Ids come from a sequence, so id order is insertion order.
        created.sort_by_key(|m| m.id());
        Ok(created)
    }

    /// Every row matching `filter`, ordered by id, without paging.
    pub async fn find_all(&self, filter: M::Filter) -> Result<Vec<M>, AppError> {
        let mut query = QueryBuilder::new(Self::select());
        push_filter(&mut query, &filter);
        query.push(" ORDER BY id ASC");

        let rows = query
            .build_query_as::<M>()
            .fetch_all(self.pool.as_ref())
            .await?;
        Ok(rows)
    }
}

#[async_trait]
impl<M> CrudRepository<M> for PgCrud<M>
where
    M: Model + for<'r> FromRow<'r, PgRow>,
{
    async fn get(&self, id: i64) -> Result<Option<M>, AppError> {
        let mut query = QueryBuilder::new(Self::select());
        query.push(" WHERE id = ").push_bind(id);

        let row = query
            .build_query_as::<M>()
            .fetch_optional(self.pool.as_ref())
            .await?;
        Ok(row)
    }

    async fn get_many(&self, ids: &[i64]) -> Result<Vec<M>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::new(Self::select());
        query
            .push(" WHERE id = ANY(")
            .push_bind(ids.to_vec())
            .push(") ORDER BY id ASC");

        let rows = query
            .build_query_as::<M>()
            .fetch_all(self.pool.as_ref())
            .await?;
        Ok(rows)
    }

    async fn get_multi(&self, page: PageRequest, filter: M::Filter) -> Result<Page<M>, AppError> {
        let mut query = QueryBuilder::new(Self::select());
        push_filter(&mut query, &filter);
        query
            .push(" ORDER BY id ASC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.skip);

        let items = query
            .build_query_as::<M>()
            .fetch_all(self.pool.as_ref())
            .await?;
        let total = self.count(filter).await?;

        Ok(Page { items, total })
    }

    async fn count(&self, filter: M::Filter) -> Result<i64, AppError> {
        let mut query = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", M::TABLE));
        push_filter(&mut query, &filter);

        let total = query
            .build_query_scalar::<i64>()
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(total)
    }

    async fn create(&self, data: M::Create) -> Result<M, AppError> {
        let mut conn = self.pool.acquire().await?;
        self.create_in(&mut conn, data).await
    }

    async fn update(&self, id: i64, data: M::Update) -> Result<M, AppError> {
        let mut query = Self::update_query(id, &data, None);

        query
            .build_query_as::<M>()
            .fetch_optional(self.pool.as_ref())
            .await?
            .ok_or_else(|| {
                AppError::not_found(
                    format!("{} row not found", M::TABLE),
                    serde_json::json!({ "id": id }),
                )
            })
    }

    async fn bulk_create(&self, data: Vec<M::Create>) -> Result<Vec<M>, AppError> {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.pool.acquire().await?;
        self.bulk_create_in(&mut conn, data).await
    }

    async fn compare_and_update(
        &self,
        id: i64,
        guard: (&'static str, Value),
        data: M::Update,
    ) -> Result<Option<M>, AppError> {
        let mut query = Self::update_query(id, &data, Some(guard));

        let row = query
            .build_query_as::<M>()
            .fetch_optional(self.pool.as_ref())
            .await?;
        Ok(row)
    }
}

fn push_value(query: &mut QueryBuilder<'static, Postgres>, value: Value) {
    match value {
        Value::Null => {
            query.push("NULL");
        }
        Value::Bool(v) => {
            query.push_bind(v);
        }
        Value::Int(v) => {
            query.push_bind(v);
        }
        Value::Text(v) => {
            query.push_bind(v);
        }
        Value::Decimal(v) => {
            query.push_bind(v);
        }
        Value::Timestamp(v) => {
            query.push_bind(v);
        }
        Value::TextArray(v) => {
            query.push_bind(v);
        }
    }
}

fn push_separated(values: &mut Separated<'_, 'static, Postgres, &'static str>, value: Value) {
    match value {
        Value::Null => {
            values.push("NULL");
        }
        Value::Bool(v) => {
            values.push_bind(v);
        }
        Value::Int(v) => {
            values.push_bind(v);
        }
        Value::Text(v) => {
            values.push_bind(v);
        }
        Value::Decimal(v) => {
            values.push_bind(v);
        }
        Value::Timestamp(v) => {
            values.push_bind(v);
        }
        Value::TextArray(v) => {
            values.push_bind(v);
        }
    }
}

fn push_condition(query: &mut QueryBuilder<'static, Postgres>, column: &str, value: Value) {
    query.push(" AND ").push(column);
    match value {
        Value::Null => {
            query.push(" IS NULL");
        }
        value => {
            query.push(" = ");
            push_value(query, value);
        }
    }
}

fn push_filter(query: &mut QueryBuilder<'static, Postgres>, filter: &impl Columns) {
    query.push(" WHERE TRUE");
    for (column, value) in filter.columns() {
        push_condition(query, column, value);
    }
}
