//! # REST API for Report Export
//!
//! Endpoints that produce CSV report data for the roster and graduate
//! reports. The response carries the content and a date-stamped filename;
//! rendering and download handling are the client's concern.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::post,
    Router,
};
use tracing::{error, info};

use crate::io::rest::error_response;
use crate::AppState;
use shared::{ExportGraduatesRequest, ExportNewComersRequest};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/new-comers", post(export_new_comers))
        .route("/graduates", post(export_graduates))
}

async fn export_new_comers(
    State(state): State<AppState>,
    Json(request): Json<ExportNewComersRequest>,
) -> Response {
    info!("POST /api/export/new-comers - request: {:?}", request);

    match state.export_service.export_new_comers(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to export new-comers: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to export new-comers")
        }
    }
}

async fn export_graduates(
    State(state): State<AppState>,
    Json(request): Json<ExportGraduatesRequest>,
) -> Response {
    info!("POST /api/export/graduates - request: {:?}", request);

    match state.export_service.export_graduates(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to export graduates: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to export graduates")
        }
    }
}
