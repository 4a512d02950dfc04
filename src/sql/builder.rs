//! Builds parameterized INSERT, SELECT, UPDATE, DELETE from resolved entity.

use crate::config::{ColumnInfo, IncludeDirection, ResolvedEntity};
use serde_json::Value;
use std::collections::HashMap;

/// One include for a list/read query: name, direction, related entity, our key column, their key column.
pub struct IncludeSelect<'a> {
    pub name: &'a str,
    pub direction: IncludeDirection,
    pub related: &'a ResolvedEntity,
    pub our_key: &'a str,
    pub their_key: &'a str,
}

/// Quote identifier for PostgreSQL (safe: only from catalog).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn push_param(&mut self, v: Value) -> usize {
        self.params.push(v);
        self.params.len()
    }
}

/// `$n::type` so every value binds regardless of its JSON type.
fn placeholder(col: &ColumnInfo, n: usize) -> String {
    format!("${}::{}", n, col.sql_type)
}

fn select_column_list(entity: &ResolvedEntity, alias: Option<&str>) -> String {
    entity
        .columns
        .iter()
        .map(|c| match alias {
            Some(a) => format!("{}.{}", a, quoted(&c.name)),
            None => quoted(&c.name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn table_of(entity: &ResolvedEntity) -> String {
    qualified_table(&entity.schema_name, &entity.table_name)
}

/// SELECT by primary key; the id is the sole param.
pub fn select_by_id(entity: &ResolvedEntity, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::default();
    let pk = &entity.pk_column;
    let ph = match entity.column(pk) {
        Some(c) => placeholder(c, q.push_param(id.clone())),
        None => format!("${}", q.push_param(id.clone())),
    };
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(entity, None),
        table_of(entity),
        quoted(pk),
        ph
    );
    q
}

/// SELECT list with optional filters (exact match per column), ORDER BY pk, optional LIMIT/OFFSET.
/// Each include becomes a scalar subquery: row_to_json for to_one, json_agg for to_many.
/// Filters on unknown columns are skipped; params are bound in filter order.
pub fn select_list(
    entity: &ResolvedEntity,
    filters: &[(String, Value)],
    limit: Option<u32>,
    offset: Option<u32>,
    includes: &[IncludeSelect<'_>],
) -> QueryBuf {
    const MAIN_ALIAS: &str = "main";
    let mut q = QueryBuf::default();

    let mut select_parts = vec![select_column_list(entity, Some(MAIN_ALIAS))];
    for inc in includes {
        let sub_from = format!(
            "{} WHERE {} = {}.{}",
            table_of(inc.related),
            quoted(inc.their_key),
            MAIN_ALIAS,
            quoted(inc.our_key)
        );
        let rel_cols = select_column_list(inc.related, None);
        let subquery = match inc.direction {
            IncludeDirection::ToOne => format!(
                "(SELECT row_to_json(sub) FROM (SELECT {} FROM {}) sub)",
                rel_cols, sub_from
            ),
            IncludeDirection::ToMany => format!(
                "(SELECT COALESCE(json_agg(row_to_json(sub)), '[]'::json) FROM (SELECT {} FROM {} ORDER BY {}) sub)",
                rel_cols,
                sub_from,
                quoted(&inc.related.pk_column)
            ),
        };
        select_parts.push(format!("{} AS {}", subquery, quoted(inc.name)));
    }

    let mut where_parts = Vec::new();
    for (col, val) in filters {
        let Some(c) = entity.column(col) else { continue };
        let ph = placeholder(c, q.push_param(val.clone()));
        where_parts.push(format!("{}.{} = {}", MAIN_ALIAS, quoted(col), ph));
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };
    let order_clause = format!(" ORDER BY {}.{}", MAIN_ALIAS, quoted(&entity.pk_column));
    let limit_clause = limit.map(|n| format!(" LIMIT {}", n.min(1000))).unwrap_or_default();
    let offset_clause = offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();

    q.sql = format!(
        "SELECT {} FROM {} {}{}{}{}{}",
        select_parts.join(", "),
        table_of(entity),
        MAIN_ALIAS,
        where_clause,
        order_clause,
        limit_clause,
        offset_clause
    );
    q
}

/// INSERT … RETURNING. The PK is skipped unless `include_pk`; columns with a DB default are
/// skipped when the body does not provide them.
pub fn insert(entity: &ResolvedEntity, body: &HashMap<String, Value>, include_pk: bool) -> QueryBuf {
    let mut q = QueryBuf::default();
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in &entity.columns {
        if c.pk_type.is_some() && !include_pk {
            continue;
        }
        let val = body.get(&c.name).cloned();
        if val.is_none() && c.has_default {
            continue;
        }
        let n = q.push_param(val.unwrap_or(Value::Null));
        cols.push(quoted(&c.name));
        placeholders.push(placeholder(c, n));
    }
    let returning = select_column_list(entity, None);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table_of(entity), returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table_of(entity),
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    q
}

/// UPDATE by id: SET only columns present in body (and in entity columns), in column order.
/// With nothing to set this degrades to a SELECT by id so callers still get the row back.
pub fn update(entity: &ResolvedEntity, id: &Value, body: &HashMap<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::default();
    let pk = &entity.pk_column;
    let mut sets = Vec::new();
    for c in &entity.columns {
        if c.name == *pk {
            continue;
        }
        let Some(v) = body.get(&c.name) else { continue };
        let ph = placeholder(c, q.push_param(v.clone()));
        sets.push(format!("{} = {}", quoted(&c.name), ph));
    }
    if sets.is_empty() {
        return select_by_id(entity, id);
    }
    let id_ph = match entity.column(pk) {
        Some(c) => placeholder(c, q.push_param(id.clone())),
        None => format!("${}", q.push_param(id.clone())),
    };
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        table_of(entity),
        sets.join(", "),
        quoted(pk),
        id_ph,
        select_column_list(entity, None)
    );
    q
}

/// DELETE by id, returning the removed row.
pub fn delete(entity: &ResolvedEntity, id: &Value) -> QueryBuf {
    let mut q = QueryBuf::default();
    let pk = &entity.pk_column;
    let ph = match entity.column(pk) {
        Some(c) => placeholder(c, q.push_param(id.clone())),
        None => format!("${}", q.push_param(id.clone())),
    };
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        table_of(entity),
        quoted(pk),
        ph,
        select_column_list(entity, None)
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_catalog, resolve, ResolvedModel};
    use serde_json::json;

    fn model() -> ResolvedModel {
        resolve(&builtin_catalog().unwrap()).unwrap()
    }

    #[test]
    fn select_by_id_casts_the_key() {
        let model = model();
        let q = select_by_id(model.entity_by_path("planets").unwrap(), &json!(3));
        assert_eq!(
            q.sql,
            r#"SELECT "planet_id", "name", "region", "climate" FROM "public"."planets" WHERE "planet_id" = $1::integer"#
        );
        assert_eq!(q.params, vec![json!(3)]);
    }

    #[test]
    fn insert_skips_serial_key_and_casts_values() {
        let model = model();
        let films = model.entity_by_path("films").unwrap();
        let body: HashMap<String, Value> = [
            ("rating".to_string(), json!("PG")),
            ("box_office".to_string(), json!(775398007)),
        ]
        .into_iter()
        .collect();
        let q = insert(films, &body, false);
        assert_eq!(
            q.sql,
            r#"INSERT INTO "public"."films" ("franchise_id", "rating", "box_office") VALUES ($1::integer, $2::varchar, $3::bigint) RETURNING "film_id", "franchise_id", "rating", "box_office""#
        );
        assert_eq!(q.params, vec![Value::Null, json!("PG"), json!(775398007)]);
    }

    #[test]
    fn update_sets_only_supplied_columns() {
        let model = model();
        let people = model.entity_by_path("people").unwrap();
        let body: HashMap<String, Value> = [
            ("role_type".to_string(), json!("Jedi Master")),
            ("person_id".to_string(), json!(99)),
            ("unknown".to_string(), json!("ignored")),
        ]
        .into_iter()
        .collect();
        let q = update(people, &json!(1), &body);
        assert_eq!(
            q.sql,
            r#"UPDATE "public"."people" SET "role_type" = $1::varchar WHERE "person_id" = $2::integer RETURNING "person_id", "name", "birth_year", "role_type""#
        );
        assert_eq!(q.params, vec![json!("Jedi Master"), json!(1)]);
    }

    #[test]
    fn empty_update_falls_back_to_select() {
        let model = model();
        let q = update(model.entity_by_path("species").unwrap(), &json!(2), &HashMap::new());
        assert!(q.sql.starts_with("SELECT "));
        assert_eq!(q.params, vec![json!(2)]);
    }

    #[test]
    fn list_applies_known_filters_and_clamps_limit() {
        let model = model();
        let books = model.entity_by_path("books").unwrap();
        let filters = vec![
            ("author".to_string(), json!("Timothy Zahn")),
            ("bogus".to_string(), json!("x")),
        ];
        let q = select_list(books, &filters, Some(5000), Some(10), &[]);
        assert!(q.sql.contains(r#"WHERE main."author" = $1::varchar"#));
        assert!(q.sql.ends_with(r#"ORDER BY main."book_id" LIMIT 1000 OFFSET 10"#));
        assert_eq!(q.params, vec![json!("Timothy Zahn")]);
    }

    #[test]
    fn list_with_includes_adds_subqueries() {
        let model = model();
        let franchise = model.entity_by_path("franchise").unwrap();
        let films = model.entity_by_path("films").unwrap();
        let inc = IncludeSelect {
            name: "films",
            direction: IncludeDirection::ToMany,
            related: films,
            our_key: "franchise_id",
            their_key: "franchise_id",
        };
        let q = select_list(franchise, &[], None, None, &[inc]);
        assert!(q.sql.contains("COALESCE(json_agg(row_to_json(sub)), '[]'::json)"));
        assert!(q.sql.contains(r#"WHERE "franchise_id" = main."franchise_id""#));
        assert!(q.sql.contains(r#"AS "films""#));
    }

    #[test]
    fn delete_returns_removed_row() {
        let model = model();
        let q = delete(model.entity_by_path("games").unwrap(), &json!(7));
        assert!(q.sql.starts_with(r#"DELETE FROM "public"."games" WHERE "game_id" = $1::integer RETURNING "#));
    }

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(quoted(r#"we"ird"#), r#""we""ird""#);
    }
}
