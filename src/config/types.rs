//! Raw catalog types matching the JSON files under `catalog/`.

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct SchemaConfig {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TableCheck {
    pub name: String,
    pub expression: String,
}

/// Multi-column unique constraint; the name is optional so `["a", "b"]` is accepted too.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum UniqueConfig {
    Columns(Vec<String>),
    Named { name: String, columns: Vec<String> },
}

impl UniqueConfig {
    pub fn columns(&self) -> &[String] {
        match self {
            UniqueConfig::Columns(c) => c,
            UniqueConfig::Named { columns, .. } => columns,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            UniqueConfig::Columns(_) => None,
            UniqueConfig::Named { name, .. } => Some(name),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TableConfig {
    pub id: String,
    #[serde(default)]
    pub schema_id: Option<String>,
    pub name: String,
    pub primary_key: String,
    #[serde(default)]
    pub unique: Vec<UniqueConfig>,
    #[serde(default)]
    pub check: Vec<TableCheck>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeConfig {
    Simple(String),
    Parameterized { name: String, params: Option<Vec<u32>> },
}

impl ColumnTypeConfig {
    pub fn base_name(&self) -> &str {
        match self {
            ColumnTypeConfig::Simple(s) => s,
            ColumnTypeConfig::Parameterized { name, .. } => name,
        }
    }

    /// DDL spelling, e.g. `varchar(100)`.
    pub fn ddl(&self) -> String {
        match self {
            ColumnTypeConfig::Simple(s) => s.clone(),
            ColumnTypeConfig::Parameterized { name, params } => {
                let p = params
                    .as_ref()
                    .map(|v| v.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", "))
                    .unwrap_or_default();
                if p.is_empty() {
                    name.clone()
                } else {
                    format!("{}({})", name, p)
                }
            }
        }
    }

    /// First type parameter, e.g. the length of `varchar(100)`.
    pub fn length(&self) -> Option<u32> {
        match self {
            ColumnTypeConfig::Simple(_) => None,
            ColumnTypeConfig::Parameterized { params, .. } => params.as_ref().and_then(|p| p.first().copied()),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ColumnConfig {
    pub id: String,
    pub table_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnTypeConfig,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub unique: bool,
    /// Raw SQL default, e.g. `0` or `now()`.
    #[serde(default)]
    pub default: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum IndexColumnEntry {
    Name(String),
    Spec { name: String, direction: Option<String> },
}

#[derive(Clone, Debug, Deserialize)]
pub struct IndexConfig {
    pub id: String,
    pub table_id: String,
    pub name: String,
    #[serde(default)]
    pub unique: bool,
    pub columns: Vec<IndexColumnEntry>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RelationshipConfig {
    pub id: String,
    pub from_table_id: String,
    pub from_column_id: String,
    pub to_table_id: String,
    pub to_column_id: String,
    #[serde(default)]
    pub on_delete: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiEntityConfig {
    pub entity_id: String,
    pub path_segment: String,
    pub operations: Vec<String>,
    #[serde(default)]
    pub validation: std::collections::HashMap<String, ValidationRule>,
}

/// The whole catalog in one struct.
#[derive(Clone, Debug, Default)]
pub struct FullConfig {
    pub schemas: Vec<SchemaConfig>,
    pub tables: Vec<TableConfig>,
    pub columns: Vec<ColumnConfig>,
    pub indexes: Vec<IndexConfig>,
    pub relationships: Vec<RelationshipConfig>,
    pub api_entities: Vec<ApiEntityConfig>,
}
