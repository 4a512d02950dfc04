//! Request validation from catalog rules and column kinds.

use crate::config::{ColumnKind, ResolvedEntity, ValidationRule};
use crate::error::AppError;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a create body: every field must be a known column of the right kind, and all
    /// required fields must be present and non-null.
    pub fn validate(body: &HashMap<String, Value>, entity: &ResolvedEntity) -> Result<(), AppError> {
        check_columns(body, entity)?;
        for (col, rule) in &entity.validation {
            let val = body.get(col);
            if rule.required == Some(true) && (val.is_none() || val == Some(&Value::Null)) {
                return Err(AppError::Validation(format!("{} is required", col)));
            }
            if let Some(v) = val {
                validate_field(col, v, rule)?;
            }
        }
        Ok(())
    }

    /// Validate only the fields present in body (for PATCH). Required fields may be omitted but
    /// not set to null.
    pub fn validate_partial(body: &HashMap<String, Value>, entity: &ResolvedEntity) -> Result<(), AppError> {
        check_columns(body, entity)?;
        for (col, v) in body {
            if let Some(rule) = entity.validation.get(col) {
                if rule.required == Some(true) && v.is_null() {
                    return Err(AppError::Validation(format!("{} cannot be null", col)));
                }
                validate_field(col, v, rule)?;
            }
        }
        Ok(())
    }
}

fn check_columns(body: &HashMap<String, Value>, entity: &ResolvedEntity) -> Result<(), AppError> {
    for (key, v) in body {
        let col = entity.column(key).ok_or_else(|| {
            AppError::Validation(format!("unknown field '{}' for {}", key, entity.path_segment))
        })?;
        if *key == entity.pk_column {
            return Err(AppError::Validation(format!("{} is assigned by the database", key)));
        }
        if v.is_null() {
            if !col.nullable {
                return Err(AppError::Validation(format!("{} cannot be null", key)));
            }
            continue;
        }
        let ok = match col.kind {
            ColumnKind::Integer => v.is_i64(),
            ColumnKind::Float => v.is_number(),
            ColumnKind::Bool => v.is_boolean(),
            ColumnKind::Text => v.is_string(),
        };
        if !ok {
            return Err(AppError::Validation(format!(
                "{} must be {}",
                key,
                match col.kind {
                    ColumnKind::Integer => "an integer",
                    ColumnKind::Float => "a number",
                    ColumnKind::Bool => "a boolean",
                    ColumnKind::Text => "a string",
                }
            )));
        }
        if let Some(n) = v.as_i64() {
            if col.kind == ColumnKind::Integer && !col.fits_integer(n) {
                return Err(AppError::Validation(format!("{} is out of range for {}", key, col.sql_type)));
            }
        }
    }
    Ok(())
}

fn validate_field(col: &str, v: &Value, rule: &ValidationRule) -> Result<(), AppError> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(max) = rule.max_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() > max as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at most {} characters",
                    col, max
                )));
            }
        }
    }
    if let Some(min) = rule.min_length {
        if let Some(s) = v.as_str() {
            if s.chars().count() < min as usize {
                return Err(AppError::Validation(format!(
                    "{} must be at least {} characters",
                    col, min
                )));
            }
        }
    }
    if let Some(ref pattern) = rule.pattern {
        let re = Regex::new(pattern).map_err(|_| AppError::Validation(format!("invalid pattern for {}", col)))?;
        if let Some(s) = v.as_str() {
            if !re.is_match(s) {
                return Err(AppError::Validation(format!("{} does not match required pattern", col)));
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            let choices: Vec<String> = allowed
                .iter()
                .map(|a| match a {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect();
            return Err(AppError::Validation(format!("{} must be one of: {}", col, choices.join(", "))));
        }
    }
    if let Some(min) = rule.minimum {
        if let Some(n) = v.as_f64() {
            if n < min {
                return Err(AppError::Validation(format!("{} must be at least {}", col, min)));
            }
        }
    }
    if let Some(max) = rule.maximum {
        if let Some(n) = v.as_f64() {
            if n > max {
                return Err(AppError::Validation(format!("{} must be at most {}", col, max)));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{builtin_catalog, resolve, ResolvedModel};
    use serde_json::json;

    fn model() -> ResolvedModel {
        resolve(&builtin_catalog().unwrap()).unwrap()
    }

    fn body(v: Value) -> HashMap<String, Value> {
        match v {
            Value::Object(m) => m.into_iter().collect(),
            _ => unreachable!(),
        }
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let model = model();
        let people = model.entity_by_path("people").unwrap();
        let err = RequestValidator::validate(&body(json!({"role_type": "Smuggler"})), people).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "name is required"));
    }

    #[test]
    fn valid_person_passes() {
        let model = model();
        let people = model.entity_by_path("people").unwrap();
        let b = body(json!({"name": "Han Solo", "birth_year": "29BBY", "role_type": "Smuggler"}));
        assert!(RequestValidator::validate(&b, people).is_ok());
    }

    #[test]
    fn birth_year_is_free_text() {
        let model = model();
        let people = model.entity_by_path("people").unwrap();
        let b = body(json!({"name": "Din Djarin", "birth_year": "Unknown"}));
        assert!(RequestValidator::validate(&b, people).is_ok());
    }

    #[test]
    fn catalog_pattern_rule_is_enforced() {
        let mut people = model().entity_by_path("people").unwrap().clone();
        people.validation.get_mut("birth_year").unwrap().pattern = Some("^[0-9]+(BBY|ABY)$".into());
        assert!(RequestValidator::validate(&body(json!({"name": "Rey", "birth_year": "15ABY"})), &people).is_ok());
        let err = RequestValidator::validate(&body(json!({"name": "Rey", "birth_year": "fifteen"})), &people).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m.contains("pattern")));
    }

    #[test]
    fn allowed_values_are_listed_in_full() {
        let mut films = model().entity_by_path("films").unwrap().clone();
        let choices = ["G", "PG", "PG-13", "R", "NC-17", "NR"];
        films.validation.get_mut("rating").unwrap().allowed = Some(choices.iter().map(|c| json!(c)).collect());
        let err = RequestValidator::validate(&body(json!({"rating": "TV-14"})), &films).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "rating must be one of: G, PG, PG-13, R, NC-17, NR"));
    }

    #[test]
    fn integer_outside_column_type_is_rejected() {
        let model = model();
        let franchise = model.entity_by_path("franchise").unwrap();
        let err = RequestValidator::validate(&body(json!({"name": "Big", "start_year": 3_000_000_000i64})), franchise)
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "start_year is out of range for integer"));
        let films = model.entity_by_path("films").unwrap();
        assert!(RequestValidator::validate(&body(json!({"box_office": 3_000_000_000i64})), films).is_ok());
    }

    #[test]
    fn primary_key_cannot_be_supplied() {
        let model = model();
        let planets = model.entity_by_path("planets").unwrap();
        let b = body(json!({"planet_id": 1, "name": "Lothal"}));
        assert!(RequestValidator::validate(&b, planets).is_err());
        assert!(RequestValidator::validate_partial(&body(json!({"planet_id": 50})), planets).is_err());
    }

    #[test]
    fn negative_box_office_is_rejected() {
        let model = model();
        let films = model.entity_by_path("films").unwrap();
        let err = RequestValidator::validate(&body(json!({"box_office": -1})), films).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m.contains("box_office")));
    }

    #[test]
    fn varchar_length_is_enforced() {
        let model = model();
        let films = model.entity_by_path("films").unwrap();
        let b = body(json!({"rating": "PG-13-EXTENDED"}));
        assert!(RequestValidator::validate(&b, films).is_err());
    }

    #[test]
    fn wrong_json_type_is_rejected() {
        let model = model();
        let franchise = model.entity_by_path("franchise").unwrap();
        let b = body(json!({"name": "Star Wars", "start_year": "1977"}));
        let err = RequestValidator::validate(&b, franchise).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "start_year must be an integer"));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let model = model();
        let planets = model.entity_by_path("planets").unwrap();
        let b = body(json!({"name": "Hoth", "moons": 3}));
        assert!(RequestValidator::validate(&b, planets).is_err());
    }

    #[test]
    fn partial_allows_missing_required_but_not_null() {
        let model = model();
        let people = model.entity_by_path("people").unwrap();
        assert!(RequestValidator::validate_partial(&body(json!({"role_type": "Jedi"})), people).is_ok());
        assert!(RequestValidator::validate_partial(&body(json!({"name": null})), people).is_err());
    }
}
