//! Generic CRUD execution against PostgreSQL.

use crate::config::{ResolvedEntity, ResolvedModel};
use crate::error::AppError;
use crate::sql::{delete, insert, select_by_id, select_list, update, IncludeSelect, PgBindValue, QueryBuf};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, PgPool};
use std::collections::HashMap;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;

pub struct CrudService;

impl CrudService {
    /// List rows with optional filters (exact match), limit (default 100, max 1000), offset (default 0).
    pub async fn list(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        filters: &[(String, Value)],
        limit: Option<u32>,
        offset: Option<u32>,
        include_names: &[String],
    ) -> Result<Vec<Value>, AppError> {
        let includes = resolve_includes(model, entity, include_names)?;
        let limit = limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
        let offset = offset.unwrap_or(0);
        let q = select_list(entity, filters, Some(limit), Some(offset), &includes);
        fetch_all(pool, &q).await
    }

    /// Fetch one row by primary key, optionally with includes.
    pub async fn read(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: &Value,
        include_names: &[String],
    ) -> Result<Option<Value>, AppError> {
        if include_names.is_empty() {
            return fetch_optional(pool, &select_by_id(entity, id)).await;
        }
        let includes = resolve_includes(model, entity, include_names)?;
        let filters = [(entity.pk_column.clone(), id.clone())];
        let q = select_list(entity, &filters, Some(1), None, &includes);
        fetch_optional(pool, &q).await
    }

    /// Insert one row and return it. A PK backed by a sequence is always left to the database.
    pub async fn create<'e, E>(
        executor: E,
        entity: &ResolvedEntity,
        body: &HashMap<String, Value>,
    ) -> Result<Value, AppError>
    where
        E: PgExecutor<'e>,
    {
        let include_pk = entity
            .column(&entity.pk_column)
            .is_some_and(|c| !c.has_default);
        let q = insert(entity, body, include_pk);
        fetch_optional(executor, &q)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    /// Patch one row by id. Returns the updated row, or None when the id does not exist.
    pub async fn update(
        pool: &PgPool,
        entity: &ResolvedEntity,
        id: &Value,
        body: &HashMap<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        fetch_optional(pool, &update(entity, id, body)).await
    }

    /// Delete one row by id. Returns the deleted row or None.
    pub async fn delete(
        pool: &PgPool,
        entity: &ResolvedEntity,
        id: &Value,
    ) -> Result<Option<Value>, AppError> {
        fetch_optional(pool, &delete(entity, id)).await
    }
}

/// Map `?include=` names to joinable entities; unknown names are a bad request.
pub fn resolve_includes<'a>(
    model: &'a ResolvedModel,
    entity: &'a ResolvedEntity,
    names: &[String],
) -> Result<Vec<IncludeSelect<'a>>, AppError> {
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let spec = entity.include(name).ok_or_else(|| {
            let known: Vec<&str> = entity.includes.iter().map(|i| i.name.as_str()).collect();
            AppError::BadRequest(format!(
                "unknown include '{}' for {} (available: {})",
                name,
                entity.path_segment,
                known.join(", ")
            ))
        })?;
        let related = model
            .entity_by_path(&spec.related_path_segment)
            .ok_or_else(|| AppError::NotFound(spec.related_path_segment.clone()))?;
        out.push(IncludeSelect {
            name: &spec.name,
            direction: spec.direction.clone(),
            related,
            our_key: &spec.our_key_column,
            their_key: &spec.their_key_column,
        });
    }
    Ok(out)
}

pub(crate) async fn fetch_optional<'e, E>(executor: E, q: &QueryBuf) -> Result<Option<Value>, AppError>
where
    E: PgExecutor<'e>,
{
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(PgBindValue::from_json(p));
    }
    let row = query.fetch_optional(executor).await?;
    Ok(row.map(|r| row_to_json(&r)))
}

pub(crate) async fn fetch_all<'e, E>(executor: E, q: &QueryBuf) -> Result<Vec<Value>, AppError>
where
    E: PgExecutor<'e>,
{
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(PgBindValue::from_json(p));
    }
    let rows = query.fetch_all(executor).await?;
    Ok(rows.iter().map(row_to_json).collect())
}

/// Reshape a row of any query into a JSON object keyed by column name.
pub(crate) fn row_to_json(row: &PgRow) -> Value {
    use sqlx::{Column, Row};
    let mut map = serde_json::Map::new();
    for col in row.columns() {
        let name = col.name();
        map.insert(name.to_string(), cell_to_value(row, name));
    }
    Value::Object(map)
}

fn cell_to_value(row: &PgRow, name: &str) -> Value {
    use sqlx::Row;
    if let Ok(Some(n)) = row.try_get::<Option<i16>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(name) {
        return Value::Number(n.into());
    }
    if let Ok(Some(n)) = row.try_get::<Option<f32>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n as f64) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(name) {
        if let Some(n) = serde_json::Number::from_f64(n) {
            return Value::Number(n);
        }
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(name) {
        return Value::Bool(b);
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(name) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(name) {
        return j;
    }
    Value::Null
}
