//! Catalog validation: every reference resolves and the API surface is consistent.

use crate::config::{FullConfig, IndexColumnEntry, OPERATIONS};
use crate::error::ConfigError;
use std::collections::{HashMap, HashSet};

/// Schema id used when a table omits `schema_id`.
pub fn default_schema_id(config: &FullConfig) -> Result<&str, ConfigError> {
    config
        .schemas
        .first()
        .map(|s| s.id.as_str())
        .ok_or_else(|| ConfigError::Validation("at least one schema required".into()))
}

fn missing(kind: &'static str, id: impl Into<String>) -> ConfigError {
    ConfigError::MissingReference { kind, id: id.into() }
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let default_sid = default_schema_id(config)?;
    let schema_ids: HashSet<&str> = config.schemas.iter().map(|s| s.id.as_str()).collect();
    let column_ids: HashSet<&str> = config.columns.iter().map(|c| c.id.as_str()).collect();

    // table id -> its column names
    let mut table_columns: HashMap<&str, HashSet<&str>> =
        config.tables.iter().map(|t| (t.id.as_str(), HashSet::new())).collect();
    for c in &config.columns {
        table_columns
            .get_mut(c.table_id.as_str())
            .ok_or_else(|| missing("table", &c.table_id))?
            .insert(c.name.as_str());
    }
    let columns_of = |table_id: &str| table_columns.get(table_id).ok_or_else(|| missing("table", table_id));

    for t in &config.tables {
        let sid = t.schema_id.as_deref().unwrap_or(default_sid);
        if !schema_ids.contains(sid) {
            return Err(missing("schema", sid));
        }
        let cols = columns_of(&t.id)?;
        if !cols.contains(t.primary_key.as_str()) {
            return Err(ConfigError::InvalidPrimaryKey {
                table_id: t.id.clone(),
                column: t.primary_key.clone(),
            });
        }
        for name in t.unique.iter().flat_map(|u| u.columns()) {
            if !cols.contains(name.as_str()) {
                return Err(missing("column", format!("{}.{}", t.id, name)));
            }
        }
    }

    for idx in &config.indexes {
        let cols = columns_of(&idx.table_id)?;
        for entry in &idx.columns {
            let name = match entry {
                IndexColumnEntry::Name(n) | IndexColumnEntry::Spec { name: n, .. } => n,
            };
            if !cols.contains(name.as_str()) {
                return Err(missing("column", format!("{}.{}", idx.table_id, name)));
            }
        }
    }

    for r in &config.relationships {
        let known = table_columns.contains_key(r.from_table_id.as_str())
            && table_columns.contains_key(r.to_table_id.as_str())
            && column_ids.contains(r.from_column_id.as_str())
            && column_ids.contains(r.to_column_id.as_str());
        if !known {
            return Err(missing("relationship", &r.id));
        }
    }

    let mut path_segments = HashSet::new();
    for api in &config.api_entities {
        let cols = columns_of(&api.entity_id)?;
        if !path_segments.insert(api.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(api.path_segment.clone()));
        }
        if let Some(op) = api.operations.iter().find(|o| !OPERATIONS.contains(&o.as_str())) {
            return Err(ConfigError::Validation(format!(
                "unknown operation '{}' for {}",
                op, api.path_segment
            )));
        }
        for (col, rule) in &api.validation {
            if !cols.contains(col.as_str()) {
                return Err(missing("column", format!("{}.{}", api.entity_id, col)));
            }
            if let Some(pattern) = &rule.pattern {
                regex::Regex::new(pattern).map_err(|e| {
                    ConfigError::Validation(format!("invalid pattern for {}.{}: {}", api.path_segment, col, e))
                })?;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::builtin_catalog;

    #[test]
    fn builtin_catalog_is_consistent() {
        validate(&builtin_catalog().unwrap()).unwrap();
    }

    #[test]
    fn duplicate_path_segment_is_rejected() {
        let mut config = builtin_catalog().unwrap();
        config.api_entities[1].path_segment = config.api_entities[0].path_segment.clone();
        assert!(matches!(validate(&config), Err(ConfigError::DuplicatePathSegment(_))));
    }

    #[test]
    fn rule_on_unknown_column_is_rejected() {
        let mut config = builtin_catalog().unwrap();
        let films = config.api_entities.iter_mut().find(|a| a.entity_id == "films").unwrap();
        films.validation.insert("title".into(), Default::default());
        assert!(matches!(validate(&config), Err(ConfigError::MissingReference { kind: "column", .. })));
    }

    #[test]
    fn unknown_operation_is_rejected() {
        let mut config = builtin_catalog().unwrap();
        config.api_entities[0].operations.push("bulk_create".into());
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }
}
