//! Entity CRUD handlers: list, create, read, update, delete.

use crate::config::{ColumnInfo, ColumnKind, PkType, ResolvedEntity};
use std::num::IntErrorKind;
use crate::error::AppError;
use crate::response::{success_created, success_many, success_one};
use crate::service::{CrudService, RequestValidator};
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::Value;
use std::collections::HashMap;

fn entity_for<'a>(state: &'a AppState, path_segment: &str, op: &str) -> Result<&'a ResolvedEntity, AppError> {
    let entity = state
        .model
        .entity_by_path(path_segment)
        .ok_or_else(|| AppError::NotFound(format!("no resource '{}'", path_segment)))?;
    if !entity.allows(op) {
        return Err(AppError::MethodNotAllowed(format!("{} not allowed on {}", op, path_segment)));
    }
    Ok(entity)
}

/// Integer ids that are well-formed but outside the key's type cannot name a row: 404, not 400.
fn parse_id(id_str: &str, pk_type: &PkType) -> Result<Value, AppError> {
    let not_found = || AppError::NotFound(format!("no row with id {}", id_str));
    let n: i64 = match pk_type {
        PkType::Text => return Ok(Value::String(id_str.to_string())),
        PkType::BigInt | PkType::Int => id_str.parse::<i64>().map_err(|e| match e.kind() {
            IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => not_found(),
            _ => AppError::BadRequest(format!("invalid id '{}'", id_str)),
        })?,
    };
    if *pk_type == PkType::Int && i32::try_from(n).is_err() {
        return Err(not_found());
    }
    Ok(Value::Number(n.into()))
}

fn body_to_map(value: Value) -> Result<HashMap<String, Value>, AppError> {
    match value {
        Value::Object(m) => Ok(m.into_iter().collect()),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// Coerce a query-string value to the JSON type of the column it filters.
fn query_value_for_column(col: &ColumnInfo, s: &str) -> Result<Value, AppError> {
    let bad = || AppError::BadRequest(format!("invalid value '{}' for filter {}", s, col.name));
    Ok(match col.kind {
        ColumnKind::Integer => {
            let n: i64 = s.parse().map_err(|_| bad())?;
            if !col.fits_integer(n) {
                return Err(AppError::BadRequest(format!("filter {} is out of range for {}", col.name, col.sql_type)));
            }
            Value::Number(n.into())
        }
        ColumnKind::Float => {
            let f: f64 = s.parse().map_err(|_| bad())?;
            serde_json::Number::from_f64(f).map(Value::Number).ok_or_else(bad)?
        }
        ColumnKind::Bool => match s.to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(bad()),
        },
        ColumnKind::Text => Value::String(s.to_string()),
    })
}

fn parse_include(raw: Option<&String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    })
    .unwrap_or_default()
}

fn parse_u32(name: &str, raw: &str) -> Result<u32, AppError> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", name)))
}

#[derive(Debug, Default, PartialEq)]
struct ListQuery {
    limit: Option<u32>,
    offset: Option<u32>,
    include: Vec<String>,
    filters: Vec<(String, Value)>,
}

/// Split raw query parameters into paging, includes and filters on known columns.
fn parse_list_query(entity: &ResolvedEntity, params: HashMap<String, String>) -> Result<ListQuery, AppError> {
    let mut q = ListQuery {
        include: parse_include(params.get("include")),
        ..Default::default()
    };
    for (k, v) in params {
        match k.as_str() {
            "limit" => q.limit = Some(parse_u32("limit", &v)?),
            "offset" => q.offset = Some(parse_u32("offset", &v)?),
            "include" => {}
            _ => {
                if let Some(col) = entity.column(&k) {
                    let val = query_value_for_column(col, &v)?;
                    q.filters.push((k, val));
                }
            }
        }
    }
    q.filters.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(q)
}

pub async fn list(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment, "read")?;
    let q = parse_list_query(entity, params)?;
    let rows = CrudService::list(&state.pool, &state.model, entity, &q.filters, q.limit, q.offset, &q.include).await?;
    Ok(success_many(rows))
}

pub async fn create(
    State(state): State<AppState>,
    Path(path_segment): Path<String>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment, "create")?;
    let body = body_to_map(body)?;
    RequestValidator::validate(&body, entity)?;
    let row = CrudService::create(&state.pool, entity, &body).await?;
    tracing::info!(entity = %entity.path_segment, "created");
    Ok(success_created(row))
}

pub async fn read(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment, "read")?;
    let id = parse_id(&id_str, &entity.pk_type)?;
    let include = parse_include(params.get("include"));
    let row = CrudService::read(&state.pool, &state.model, entity, &id, &include)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", path_segment, id_str)))?;
    Ok(success_one(row))
}

pub async fn update(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment, "update")?;
    let id = parse_id(&id_str, &entity.pk_type)?;
    let body = body_to_map(body)?;
    RequestValidator::validate_partial(&body, entity)?;
    let row = CrudService::update(&state.pool, entity, &id, &body)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", path_segment, id_str)))?;
    tracing::info!(entity = %entity.path_segment, id = %id_str, "updated");
    Ok(success_one(row))
}

pub async fn delete(
    State(state): State<AppState>,
    Path((path_segment, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let entity = entity_for(&state, &path_segment, "delete")?;
    let id = parse_id(&id_str, &entity.pk_type)?;
    CrudService::delete(&state.pool, entity, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("{} {}", path_segment, id_str)))?;
    tracing::info!(entity = %entity.path_segment, id = %id_str, "deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_catalog, resolve};

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn integer_ids_must_parse() {
        assert_eq!(parse_id("42", &PkType::Int).unwrap(), Value::from(42));
        assert!(matches!(parse_id("abc", &PkType::Int), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn ids_beyond_the_key_type_are_not_found() {
        assert!(matches!(parse_id("99999999999", &PkType::Int), Err(AppError::NotFound(_))));
        assert!(matches!(parse_id("-2147483649", &PkType::Int), Err(AppError::NotFound(_))));
        assert!(matches!(parse_id("99999999999999999999", &PkType::BigInt), Err(AppError::NotFound(_))));
        assert_eq!(parse_id("99999999999", &PkType::BigInt).unwrap(), Value::from(99_999_999_999i64));
        assert_eq!(parse_id("2147483647", &PkType::Int).unwrap(), Value::from(i32::MAX));
    }

    #[test]
    fn integer_filter_outside_column_type_is_bad_request() {
        let model = resolve(&builtin_catalog().unwrap()).unwrap();
        let films = model.entity_by_path("films").unwrap();
        assert!(matches!(
            parse_list_query(films, params(&[("franchise_id", "99999999999")])),
            Err(AppError::BadRequest(_))
        ));
        let q = parse_list_query(films, params(&[("box_office", "99999999999")])).unwrap();
        assert_eq!(q.filters, vec![("box_office".to_string(), Value::from(99_999_999_999i64))]);
    }

    #[test]
    fn list_query_coerces_filters_and_ignores_unknown_keys() {
        let model = resolve(&builtin_catalog().unwrap()).unwrap();
        let films = model.entity_by_path("films").unwrap();
        let q = parse_list_query(
            films,
            params(&[("limit", "5"), ("franchise_id", "2"), ("rating", "PG"), ("bogus", "1"), ("include", "franchise")]),
        )
        .unwrap();
        assert_eq!(q.limit, Some(5));
        assert_eq!(q.offset, None);
        assert_eq!(q.include, vec!["franchise".to_string()]);
        assert_eq!(
            q.filters,
            vec![("franchise_id".to_string(), Value::from(2)), ("rating".to_string(), Value::from("PG"))]
        );
    }

    #[test]
    fn malformed_paging_and_filters_are_bad_requests() {
        let model = resolve(&builtin_catalog().unwrap()).unwrap();
        let films = model.entity_by_path("films").unwrap();
        assert!(matches!(parse_list_query(films, params(&[("limit", "-1")])), Err(AppError::BadRequest(_))));
        assert!(matches!(
            parse_list_query(films, params(&[("box_office", "lots")])),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn include_list_is_trimmed() {
        let raw = " franchise , ,films".to_string();
        assert_eq!(parse_include(Some(&raw)), vec!["franchise", "films"]);
        assert!(parse_include(None).is_empty());
    }

    #[test]
    fn body_must_be_an_object() {
        assert!(body_to_map(serde_json::json!([1])).is_err());
        assert_eq!(body_to_map(serde_json::json!({"a": 1})).unwrap().len(), 1);
    }
}
