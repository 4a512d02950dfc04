//! Load the catalog (embedded or from a directory) and resolve it into the runtime model.

use crate::config::resolved::{
    ColumnInfo, ColumnKind, IncludeDirection, IncludeSpec, PkType, ResolvedEntity, ResolvedModel,
};
use crate::config::types::*;
use crate::config::{default_schema_id, validate, FullConfig};
use crate::error::ConfigError;
use std::collections::HashMap;
use std::path::Path;

const SCHEMAS_JSON: &str = include_str!("../../catalog/schemas.json");
const TABLES_JSON: &str = include_str!("../../catalog/tables.json");
const COLUMNS_JSON: &str = include_str!("../../catalog/columns.json");
const INDEXES_JSON: &str = include_str!("../../catalog/indexes.json");
const RELATIONSHIPS_JSON: &str = include_str!("../../catalog/relationships.json");
const API_ENTITIES_JSON: &str = include_str!("../../catalog/api_entities.json");

/// The catalog compiled into the binary.
pub fn builtin_catalog() -> Result<FullConfig, ConfigError> {
    Ok(FullConfig {
        schemas: parse("schemas.json", SCHEMAS_JSON)?,
        tables: parse("tables.json", TABLES_JSON)?,
        columns: parse("columns.json", COLUMNS_JSON)?,
        indexes: parse("indexes.json", INDEXES_JSON)?,
        relationships: parse("relationships.json", RELATIONSHIPS_JSON)?,
        api_entities: parse("api_entities.json", API_ENTITIES_JSON)?,
    })
}

/// Load a catalog from a directory holding the same JSON files. `indexes.json` and
/// `relationships.json` may be absent.
pub async fn load_from_dir(dir: &Path) -> Result<FullConfig, ConfigError> {
    Ok(FullConfig {
        schemas: read_file(dir, "schemas.json", false).await?,
        tables: read_file(dir, "tables.json", false).await?,
        columns: read_file(dir, "columns.json", false).await?,
        indexes: read_file(dir, "indexes.json", true).await?,
        relationships: read_file(dir, "relationships.json", true).await?,
        api_entities: read_file(dir, "api_entities.json", false).await?,
    })
}

async fn read_file<T>(dir: &Path, file: &str, optional: bool) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let path = dir.join(file);
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if optional && e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ConfigError::Load(format!("{}: {}", path.display(), e))),
    };
    parse(file, &raw)
}

fn parse<T>(file: &str, raw: &str) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    serde_json::from_str(raw).map_err(|e| ConfigError::Load(format!("{}: {}", file, e)))
}

/// Build resolved model from full config. Validates first.
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;
    let default_sid = default_schema_id(config)?;

    let schemas_by_id: HashMap<_, _> = config.schemas.iter().map(|s| (s.id.as_str(), s)).collect();
    let tables_by_id: HashMap<_, _> = config.tables.iter().map(|t| (t.id.as_str(), t)).collect();
    let columns_by_table: HashMap<_, Vec<&ColumnConfig>> = config
        .columns
        .iter()
        .fold(HashMap::new(), |mut m, c| {
            m.entry(c.table_id.as_str()).or_default().push(c);
            m
        });
    let column_id_to_name: HashMap<&str, &str> = config.columns.iter().map(|c| (c.id.as_str(), c.name.as_str())).collect();
    let table_id_to_path: HashMap<&str, &str> = config
        .api_entities
        .iter()
        .map(|api| (api.entity_id.as_str(), api.path_segment.as_str()))
        .collect();

    let mut entities = Vec::new();
    let mut entity_by_path = HashMap::new();

    for api in &config.api_entities {
        let table = tables_by_id
            .get(api.entity_id.as_str())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "table",
                id: api.entity_id.clone(),
            })?;
        let table_sid = table.schema_id.as_deref().unwrap_or(default_sid);
        let schema = schemas_by_id
            .get(table_sid)
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "schema",
                id: table_sid.to_string(),
            })?;
        let table_columns = columns_by_table
            .get(table.id.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);

        let pk_col = table_columns
            .iter()
            .find(|c| c.name == table.primary_key)
            .ok_or_else(|| ConfigError::InvalidPrimaryKey {
                table_id: table.id.clone(),
                column: table.primary_key.clone(),
            })?;
        let pk_type = infer_pk_type(pk_col);

        let columns: Vec<ColumnInfo> = table_columns
            .iter()
            .map(|c| {
                let is_pk = c.name == table.primary_key;
                ColumnInfo {
                    name: c.name.clone(),
                    pk_type: if is_pk { Some(pk_type.clone()) } else { None },
                    nullable: c.nullable && !is_pk,
                    has_default: c.default.is_some() || is_serial(&c.type_),
                    sql_type: cast_type_name(&c.type_),
                    kind: column_kind(&c.type_),
                }
            })
            .collect();

        let validation = merge_validation(table_columns, &table.primary_key, &api.validation);
        let includes = build_includes_for_table(
            &table.id,
            &config.relationships,
            &column_id_to_name,
            &table_id_to_path,
        );
        let entity = ResolvedEntity {
            table_id: table.id.clone(),
            schema_name: schema.name.clone(),
            table_name: table.name.clone(),
            path_segment: api.path_segment.clone(),
            pk_column: table.primary_key.clone(),
            pk_type,
            columns,
            operations: api.operations.clone(),
            includes,
            validation,
        };
        entity_by_path.insert(api.path_segment.clone(), entity.clone());
        entities.push(entity);
    }

    Ok(ResolvedModel {
        entities,
        entity_by_path,
    })
}

/// Catalog rules win; gaps are filled from the column definitions (NOT NULL without default
/// becomes `required`, `varchar(n)` becomes `max_length`).
fn merge_validation(
    columns: &[&ColumnConfig],
    pk: &str,
    explicit: &HashMap<String, ValidationRule>,
) -> HashMap<String, ValidationRule> {
    let mut rules = explicit.clone();
    for c in columns {
        if c.name == pk {
            continue;
        }
        let rule = rules.entry(c.name.clone()).or_default();
        if rule.required.is_none() && !c.nullable && c.default.is_none() {
            rule.required = Some(true);
        }
        if rule.max_length.is_none() && column_kind(&c.type_) == ColumnKind::Text {
            rule.max_length = c.type_.length();
        }
    }
    rules.retain(|_, r| *r != ValidationRule::default());
    rules
}

fn build_includes_for_table(
    our_table_id: &str,
    relationships: &[RelationshipConfig],
    column_id_to_name: &HashMap<&str, &str>,
    table_id_to_path: &HashMap<&str, &str>,
) -> Vec<IncludeSpec> {
    let mut includes = Vec::new();
    for rel in relationships {
        let from_col = column_id_to_name.get(rel.from_column_id.as_str()).map(|s| s.to_string());
        let to_col = column_id_to_name.get(rel.to_column_id.as_str()).map(|s| s.to_string());
        let from_path = table_id_to_path.get(rel.from_table_id.as_str()).map(|s| s.to_string());
        let to_path = table_id_to_path.get(rel.to_table_id.as_str()).map(|s| s.to_string());
        if rel.from_table_id == our_table_id {
            if let (Some(our_key), Some(their_key), Some(related_path)) = (from_col.clone(), to_col.clone(), to_path) {
                let name = our_key.strip_suffix("_id").unwrap_or(&our_key).to_string();
                includes.push(IncludeSpec {
                    name,
                    direction: IncludeDirection::ToOne,
                    related_path_segment: related_path,
                    our_key_column: our_key,
                    their_key_column: their_key,
                });
            }
        }
        if rel.to_table_id == our_table_id {
            if let (Some(our_key), Some(their_key), Some(related_path)) = (to_col, from_col, from_path) {
                includes.push(IncludeSpec {
                    name: related_path.clone(),
                    direction: IncludeDirection::ToMany,
                    related_path_segment: related_path,
                    our_key_column: our_key,
                    their_key_column: their_key,
                });
            }
        }
    }
    includes
}

fn is_serial(ty: &ColumnTypeConfig) -> bool {
    matches!(
        ty.base_name().to_lowercase().as_str(),
        "serial" | "bigserial" | "smallserial"
    )
}

/// Serial pseudo-types cannot appear in casts; map them to their storage type.
fn cast_type_name(ty: &ColumnTypeConfig) -> String {
    let lower = ty.base_name().to_lowercase();
    match lower.as_str() {
        "serial" => "integer".into(),
        "bigserial" => "bigint".into(),
        "smallserial" => "smallint".into(),
        _ => lower,
    }
}

fn column_kind(ty: &ColumnTypeConfig) -> ColumnKind {
    let lower = ty.base_name().to_lowercase();
    if lower.contains("int") || lower.contains("serial") {
        ColumnKind::Integer
    } else if lower.starts_with("bool") {
        ColumnKind::Bool
    } else if matches!(lower.as_str(), "real" | "double precision" | "float4" | "float8" | "numeric" | "decimal") {
        ColumnKind::Float
    } else {
        ColumnKind::Text
    }
}

fn infer_pk_type(col: &ColumnConfig) -> PkType {
    let type_lower = col.type_.base_name().to_lowercase();
    if type_lower.contains("bigserial") || type_lower.contains("bigint") {
        PkType::BigInt
    } else if type_lower.contains("serial") || type_lower.contains("int") {
        PkType::Int
    } else {
        PkType::Text
    }
}
