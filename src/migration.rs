//! Apply the catalog to the database: schemas, tables, indexes, foreign keys, then the
//! `character_overview` view and `characters_by_affiliation` routine. Every step is idempotent.

use crate::config::types::*;
use crate::config::{default_schema_id, validate, FullConfig};
use crate::error::{AppError, ConfigError};
use crate::sql::{qualified_table, quoted};
use sqlx::PgPool;
use std::collections::HashMap;

/// Foreign keys have no `IF NOT EXISTS`; they are added only when the constraint name is unused.
#[derive(Debug, Clone)]
pub struct ForeignKeyDdl {
    pub name: String,
    pub sql: String,
}

#[derive(Debug, Clone, Default)]
pub struct MigrationPlan {
    pub statements: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyDdl>,
    pub routines: Vec<String>,
}

/// Tables the view and routine read from.
const ROUTINE_TABLES: &[&str] = &["characters", "people", "species", "affiliations"];

const CHARACTER_OVERVIEW_VIEW: &str = r#"
CREATE OR REPLACE VIEW character_overview AS
SELECT c.character_id,
       c.name AS character_name,
       p.name AS played_by,
       s.name AS species,
       a.name AS affiliation
FROM characters c
LEFT JOIN people p       ON p.person_id = c.person_id
LEFT JOIN species s      ON s.species_id = c.species_id
LEFT JOIN affiliations a ON a.affiliation_id = c.affiliation_id
"#;

const CHARACTERS_BY_AFFILIATION_FN: &str = r#"
CREATE OR REPLACE FUNCTION characters_by_affiliation(affiliation_name TEXT)
RETURNS TABLE (character_id INTEGER, character_name VARCHAR, species VARCHAR, played_by VARCHAR)
LANGUAGE sql STABLE AS $$
    SELECT c.character_id, c.name, s.name, p.name
    FROM characters c
    JOIN affiliations a ON a.affiliation_id = c.affiliation_id
    LEFT JOIN species s ON s.species_id = c.species_id
    LEFT JOIN people p  ON p.person_id = c.person_id
    WHERE a.name = affiliation_name
    ORDER BY c.character_id
$$
"#;

/// Build the DDL for a catalog without touching the database.
pub fn plan(config: &FullConfig) -> Result<MigrationPlan, ConfigError> {
    validate(config)?;
    let default_sid = default_schema_id(config)?;

    let schemas_by_id: HashMap<_, _> = config.schemas.iter().map(|s| (s.id.as_str(), s)).collect();
    let tables_by_id: HashMap<_, _> = config.tables.iter().map(|t| (t.id.as_str(), t)).collect();
    let columns_by_id: HashMap<_, _> = config.columns.iter().map(|c| (c.id.as_str(), c)).collect();
    let columns_by_table: HashMap<_, Vec<&ColumnConfig>> = config.columns.iter().fold(
        HashMap::new(),
        |mut m, c| {
            m.entry(c.table_id.as_str()).or_default().push(c);
            m
        },
    );
    let full_table_name = |t: &TableConfig| -> Result<String, ConfigError> {
        let sid = t.schema_id.as_deref().unwrap_or(default_sid);
        let schema = schemas_by_id.get(sid).ok_or_else(|| ConfigError::MissingReference {
            kind: "schema",
            id: sid.to_string(),
        })?;
        Ok(qualified_table(&schema.name, &t.name))
    };

    let mut out = MigrationPlan::default();

    for s in &config.schemas {
        out.statements.push(format!("CREATE SCHEMA IF NOT EXISTS {}", quoted(&s.name)));
    }

    for t in &config.tables {
        let cols = columns_by_table
            .get(t.id.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);
        let mut col_defs: Vec<String> = Vec::new();
        for c in cols {
            let mut def = format!("{} {}", quoted(&c.name), c.type_.ddl());
            if !c.nullable {
                def.push_str(" NOT NULL");
            }
            if c.unique {
                def.push_str(" UNIQUE");
            }
            if let Some(ref d) = c.default {
                def.push_str(" DEFAULT ");
                def.push_str(d);
            }
            col_defs.push(def);
        }
        col_defs.push(format!("PRIMARY KEY ({})", quoted(&t.primary_key)));
        for u in &t.unique {
            let cols: Vec<String> = u.columns().iter().map(|s| quoted(s)).collect();
            match u.name() {
                Some(name) => col_defs.push(format!("CONSTRAINT {} UNIQUE ({})", quoted(name), cols.join(", "))),
                None => col_defs.push(format!("UNIQUE ({})", cols.join(", "))),
            }
        }
        for ch in &t.check {
            col_defs.push(format!("CONSTRAINT {} CHECK ({})", quoted(&ch.name), ch.expression));
        }
        out.statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            full_table_name(t)?,
            col_defs.join(",\n  ")
        ));
    }

    for idx in &config.indexes {
        let table = tables_by_id.get(idx.table_id.as_str()).ok_or_else(|| ConfigError::MissingReference {
            kind: "table",
            id: idx.table_id.clone(),
        })?;
        let col_parts: Vec<String> = idx
            .columns
            .iter()
            .map(|col| match col {
                IndexColumnEntry::Name(n) => quoted(n),
                IndexColumnEntry::Spec { name, direction } => {
                    let dir = direction
                        .as_deref()
                        .map(|d| format!(" {}", d.to_uppercase()))
                        .unwrap_or_default();
                    format!("{}{}", quoted(name), dir)
                }
            })
            .collect();
        let unique = if idx.unique { "UNIQUE " } else { "" };
        out.statements.push(format!(
            "CREATE {}INDEX IF NOT EXISTS {} ON {} USING btree ({})",
            unique,
            quoted(&idx.name),
            full_table_name(table)?,
            col_parts.join(", ")
        ));
    }

    for rel in &config.relationships {
        let lookup_table = |id: &str| {
            tables_by_id.get(id).copied().ok_or_else(|| ConfigError::MissingReference {
                kind: "table",
                id: id.to_string(),
            })
        };
        let lookup_column = |id: &str| {
            columns_by_id.get(id).map(|c| c.name.as_str()).ok_or_else(|| ConfigError::MissingReference {
                kind: "column",
                id: id.to_string(),
            })
        };
        let from_table = lookup_table(&rel.from_table_id)?;
        let to_table = lookup_table(&rel.to_table_id)?;
        let from_col = lookup_column(&rel.from_column_id)?;
        let to_col = lookup_column(&rel.to_column_id)?;
        let name = rel.name.clone().unwrap_or_else(|| rel.id.clone());
        let sql = format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
            full_table_name(from_table)?,
            quoted(&name),
            quoted(from_col),
            full_table_name(to_table)?,
            quoted(to_col),
            rel.on_delete.as_deref().unwrap_or("NO ACTION")
        );
        out.foreign_keys.push(ForeignKeyDdl { name, sql });
    }

    let has_routine_tables = ROUTINE_TABLES
        .iter()
        .all(|name| config.tables.iter().any(|t| t.name == *name));
    if has_routine_tables {
        out.routines.push(CHARACTER_OVERVIEW_VIEW.trim().to_string());
        out.routines.push(CHARACTERS_BY_AFFILIATION_FN.trim().to_string());
    } else {
        tracing::warn!("catalog lacks character tables; skipping character_overview and characters_by_affiliation");
    }

    Ok(out)
}

/// Apply the catalog in a single transaction.
pub async fn apply_migrations(pool: &PgPool, config: &FullConfig) -> Result<(), AppError> {
    let plan = plan(config)?;
    let mut tx = pool.begin().await?;

    for sql in &plan.statements {
        tracing::debug!(sql = %sql, "migrate");
        sqlx::query(sql).execute(&mut *tx).await?;
    }

    let mut added = 0usize;
    for fk in &plan.foreign_keys {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_constraint WHERE conname = $1)")
            .bind(&fk.name)
            .fetch_one(&mut *tx)
            .await?;
        if exists {
            continue;
        }
        tracing::debug!(sql = %fk.sql, "migrate");
        sqlx::query(&fk.sql).execute(&mut *tx).await?;
        added += 1;
    }

    for sql in &plan.routines {
        tracing::debug!(sql = %sql, "migrate");
        sqlx::query(sql).execute(&mut *tx).await?;
    }

    tx.commit().await?;
    tracing::info!(
        tables = config.tables.len(),
        foreign_keys_added = added,
        routines = plan.routines.len(),
        "migrations applied"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_catalog;

    #[test]
    fn films_table_carries_check_constraint() {
        let plan = plan(&builtin_catalog().unwrap()).unwrap();
        let films = plan
            .statements
            .iter()
            .find(|s| s.starts_with(r#"CREATE TABLE IF NOT EXISTS "public"."films""#))
            .unwrap();
        assert!(films.contains(r#""film_id" serial NOT NULL"#));
        assert!(films.contains(r#"CONSTRAINT "check_box_office_positive" CHECK (box_office >= 0)"#));
        assert!(films.contains(r#"PRIMARY KEY ("film_id")"#));
    }

    #[test]
    fn characters_table_has_named_unique_pair() {
        let plan = plan(&builtin_catalog().unwrap()).unwrap();
        let characters = plan
            .statements
            .iter()
            .find(|s| s.contains(r#""public"."characters""#))
            .unwrap();
        assert!(characters.contains(r#"CONSTRAINT "uix_character_species" UNIQUE ("name", "species_id")"#));
    }

    #[test]
    fn unique_columns_and_varchar_lengths_are_emitted() {
        let plan = plan(&builtin_catalog().unwrap()).unwrap();
        let franchise = plan
            .statements
            .iter()
            .find(|s| s.contains(r#""public"."franchise""#))
            .unwrap();
        assert!(franchise.contains(r#""name" varchar(100) NOT NULL UNIQUE"#));
    }

    #[test]
    fn index_and_foreign_keys_are_planned() {
        let plan = plan(&builtin_catalog().unwrap()).unwrap();
        assert!(plan.statements.iter().any(|s| s
            == r#"CREATE INDEX IF NOT EXISTS "idx_films_franchise" ON "public"."films" USING btree ("franchise_id")"#));
        assert_eq!(plan.foreign_keys.len(), 7);
        let fk = plan.foreign_keys.iter().find(|f| f.name == "fk_characters_species").unwrap();
        assert!(fk.sql.contains(r#"REFERENCES "public"."species" ("species_id")"#));
        assert!(fk.sql.ends_with("ON DELETE SET NULL"));
    }

    #[test]
    fn routines_follow_tables() {
        let plan = plan(&builtin_catalog().unwrap()).unwrap();
        assert_eq!(plan.routines.len(), 2);
        assert!(plan.routines[0].starts_with("CREATE OR REPLACE VIEW character_overview"));
        assert!(plan.routines[1].starts_with("CREATE OR REPLACE FUNCTION characters_by_affiliation"));
    }

    #[test]
    fn catalog_without_character_tables_skips_routines() {
        let mut config = builtin_catalog().unwrap();
        config.tables.retain(|t| t.id == "planets");
        config.columns.retain(|c| c.table_id == "planets");
        config.indexes.clear();
        config.relationships.clear();
        config.api_entities.retain(|a| a.entity_id == "planets");
        let plan = plan(&config).unwrap();
        assert!(plan.routines.is_empty());
    }
}
