//! Response envelope: `{"data": …}` for one record, `{"data": […], "meta": {"count": n}}` for many.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub data: T,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

pub fn success_created<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::CREATED, Json(SuccessOne { data }))
}

pub fn success_one<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (StatusCode::OK, Json(SuccessOne { data }))
}

pub fn success_many<T: Serialize>(data: Vec<T>) -> (StatusCode, Json<SuccessMany<T>>) {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(SuccessMany {
            data,
            meta: MetaCount { count },
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn many_envelope_counts_rows() {
        let (status, Json(body)) = success_many(vec![1, 2, 3]);
        assert_eq!(status, StatusCode::OK);
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v, serde_json::json!({"data": [1, 2, 3], "meta": {"count": 3}}));
    }

    #[test]
    fn created_envelope_has_no_meta() {
        let (status, Json(body)) = success_created("x");
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(serde_json::to_value(&body).unwrap(), serde_json::json!({"data": "x"}));
    }
}
