//! Resolved entity model: catalog validated and flattened for runtime use.

use crate::config::ValidationRule;
use std::collections::HashMap;

/// Operations an entity can expose. Stored as strings in the catalog.
pub const OPERATIONS: &[&str] = &["read", "create", "update", "delete"];

/// Direction of a related-include: to_one (we have FK to them) or to_many (they have FK to us).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncludeDirection {
    ToOne,
    ToMany,
}

/// Spec for including a related entity in list/read responses.
#[derive(Clone, Debug)]
pub struct IncludeSpec {
    /// Name used in `?include=`. To-one includes are named after the FK column without `_id`
    /// (`franchise`, `species`); to-many includes use the related entity's path segment (`films`).
    pub name: String,
    pub direction: IncludeDirection,
    pub related_path_segment: String,
    /// Our column used in the join (our FK for to_one; our PK for to_many).
    pub our_key_column: String,
    /// Their column used in the join (their PK for to_one; their FK for to_many).
    pub their_key_column: String,
}

/// Primary key type for parsing path ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PkType {
    BigInt,
    Int,
    Text,
}

/// JSON shape a column accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    Bool,
    Text,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: String,
    pub pk_type: Option<PkType>,
    pub nullable: bool,
    /// Whether the column has a DB default (serial sequence or explicit DEFAULT).
    pub has_default: bool,
    /// Type used to cast bound parameters (e.g. "integer", "varchar").
    pub sql_type: String,
    pub kind: ColumnKind,
}

impl ColumnInfo {
    /// Inclusive bounds of an integer column's SQL type; `None` for non-integer columns.
    pub fn integer_range(&self) -> Option<(i64, i64)> {
        if self.kind != ColumnKind::Integer {
            return None;
        }
        Some(match self.sql_type.as_str() {
            "smallint" | "int2" => (i16::MIN as i64, i16::MAX as i64),
            "bigint" | "int8" => (i64::MIN, i64::MAX),
            _ => (i32::MIN as i64, i32::MAX as i64),
        })
    }

    pub fn fits_integer(&self, n: i64) -> bool {
        self.integer_range().is_some_and(|(lo, hi)| (lo..=hi).contains(&n))
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    pub table_id: String,
    pub schema_name: String,
    pub table_name: String,
    pub path_segment: String,
    pub pk_column: String,
    pub pk_type: PkType,
    pub columns: Vec<ColumnInfo>,
    pub operations: Vec<String>,
    pub includes: Vec<IncludeSpec>,
    /// Catalog rules merged with rules derived from column definitions.
    pub validation: HashMap<String, ValidationRule>,
}

impl ResolvedEntity {
    pub fn allows(&self, operation: &str) -> bool {
        self.operations.iter().any(|o| o == operation)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn include(&self, name: &str) -> Option<&IncludeSpec> {
        self.includes.iter().find(|i| i.name == name)
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, ResolvedEntity>,
}

impl ResolvedModel {
    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path)
    }
}
