//! # REST API Interface Layer
//!
//! HTTP endpoints for the new-family registry. Handlers log the request,
//! call into the domain services, and translate failures into status codes
//! with a JSON `{"error": message}` body. No business logic lives here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

pub mod code_apis;
pub mod education_apis;
pub mod export_apis;
pub mod graduate_apis;
pub mod new_comer_apis;
pub mod statistics_apis;

/// Build the JSON error body shared by every handler
pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// Service errors that name a missing row become 404, the rest 400
pub(crate) fn client_error_status(error: &anyhow::Error) -> StatusCode {
    if error.to_string().contains("not found") {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::BAD_REQUEST
    }
}
