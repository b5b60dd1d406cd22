//! Success envelope shared by every handler.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use caseclerk_core::{Page, Pagination};
use serde::Serialize;
use serde_json::json;

/// `{"success": true, "data": ..., "pagination"?: ...}`
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            pagination: None,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

pub fn ok<T: Serialize>(data: T) -> Envelope<T> {
    Envelope::new(data)
}

pub fn created<T: Serialize>(data: T) -> (StatusCode, Envelope<T>) {
    (StatusCode::CREATED, Envelope::new(data))
}

pub fn paged<T: Serialize>(page: Page<T>) -> Envelope<Vec<T>> {
    Envelope {
        success: true,
        data: page.items,
        pagination: Some(page.pagination),
    }
}

pub fn deleted(id: impl Into<u64>) -> Envelope<serde_json::Value> {
    Envelope::new(json!({ "id": id.into(), "deleted": true }))
}
