//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} id '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: table {table_id} column {column}")]
    InvalidPrimaryKey { table_id: String, column: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("catalog load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("environment variable {var}: {reason}")]
    Env { var: &'static str, reason: String },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl AppError {
    /// Status and machine-readable code. Constraint violations and data exceptions (SQLSTATE
    /// class 22) reported by the database are client errors; everything else from the database
    /// is a 500 carrying the raw message.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(sqlx::Error::RowNotFound) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Db(sqlx::Error::Database(db)) => {
                if db.is_unique_violation() || db.is_foreign_key_violation() {
                    (StatusCode::CONFLICT, "conflict")
                } else if db.is_check_violation() || is_data_exception(db.code().as_deref()) {
                    (StatusCode::UNPROCESSABLE_ENTITY, "validation_error")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            AppError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::MethodNotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "method_not_allowed"),
        }
    }
}

fn is_data_exception(sqlstate: Option<&str>) -> bool {
    sqlstate.is_some_and(|c| c.starts_with("22"))
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        } else {
            tracing::debug!(error = %self, code, "request rejected");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let (status, json) = render(AppError::NotFound("people/42".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "not_found");
        assert_eq!(json["error"]["message"], "not found: people/42");
    }

    #[tokio::test]
    async fn validation_maps_to_422() {
        let (status, json) = render(AppError::Validation("name is required".into())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["error"]["code"], "validation_error");
    }

    #[tokio::test]
    async fn generic_database_error_keeps_raw_message() {
        let err = AppError::Db(sqlx::Error::Protocol("relation \"character_overview\" does not exist".into()));
        let (status, json) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"]["code"], "database_error");
        assert!(json["error"]["message"]
            .as_str()
            .unwrap()
            .contains("relation \"character_overview\" does not exist"));
    }

    #[test]
    fn sqlstate_class_22_is_a_data_exception() {
        assert!(is_data_exception(Some("22003")));
        assert!(is_data_exception(Some("22P02")));
        assert!(!is_data_exception(Some("23505")));
        assert!(!is_data_exception(None));
    }

    #[tokio::test]
    async fn row_not_found_maps_to_404() {
        let (status, _) = render(AppError::Db(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn disallowed_operation_maps_to_405() {
        let (status, json) = render(AppError::MethodNotAllowed("delete on planets".into())).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(json["error"]["code"], "method_not_allowed");
    }
}
