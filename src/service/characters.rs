//! Hand-written character queries: the four-table join and the passthroughs to the
//! `character_overview` view and the `characters_by_affiliation` routine.

use crate::error::AppError;
use crate::service::crud::row_to_json;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

/// One character with its person, species and affiliation flattened in.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct CharacterDetail {
    pub character_id: i32,
    pub character_name: Option<String>,
    pub person_name: Option<String>,
    pub birth_year: Option<String>,
    pub role_type: Option<String>,
    pub species: Option<String>,
    pub classification: Option<String>,
    pub affiliation: Option<String>,
}

const CHARACTER_DETAILS_SQL: &str = r#"
SELECT c.character_id,
       c.name          AS character_name,
       p.name          AS person_name,
       p.birth_year,
       p.role_type,
       s.name          AS species,
       s.classification,
       a.name          AS affiliation
FROM characters c
LEFT JOIN people p       ON p.person_id = c.person_id
LEFT JOIN species s      ON s.species_id = c.species_id
LEFT JOIN affiliations a ON a.affiliation_id = c.affiliation_id
ORDER BY c.character_id
"#;

pub struct CharacterQueries;

impl CharacterQueries {
    /// Characters joined with people, species and affiliations. Missing links come back as null.
    pub async fn details(pool: &PgPool) -> Result<Vec<CharacterDetail>, AppError> {
        tracing::debug!(sql = %CHARACTER_DETAILS_SQL, "query");
        let rows = sqlx::query_as::<_, CharacterDetail>(CHARACTER_DETAILS_SQL)
            .fetch_all(pool)
            .await?;
        Ok(rows)
    }

    /// Every row of the `character_overview` view, as key-value records.
    pub async fn overview(pool: &PgPool) -> Result<Vec<Value>, AppError> {
        let sql = "SELECT * FROM character_overview";
        tracing::debug!(sql = %sql, "query");
        let rows = sqlx::query(sql).fetch_all(pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }

    /// Rows returned by the `characters_by_affiliation` routine for one affiliation name.
    pub async fn by_affiliation(pool: &PgPool, affiliation: &str) -> Result<Vec<Value>, AppError> {
        let sql = "SELECT * FROM characters_by_affiliation($1)";
        tracing::debug!(sql = %sql, affiliation, "query");
        let rows = sqlx::query(sql).bind(affiliation).fetch_all(pool).await?;
        Ok(rows.iter().map(row_to_json).collect())
    }
}
