//! # REST API for Education Progress
//!
//! Upsert-style endpoints for weekly education records, served under both
//! `/new-comer-education` and `/transfer-believer-education` (the record is
//! keyed by registrant, so the same handlers back both prefixes).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tracing::{error, info};

use crate::io::rest::{client_error_status, error_response};
use crate::AppState;
use shared::UpsertEducationRequest;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(upsert_education))
        .route("/:new_comer_id", get(get_education))
}

async fn upsert_education(
    State(state): State<AppState>,
    Json(request): Json<UpsertEducationRequest>,
) -> Response {
    info!("POST education progress for new-comer {}", request.new_comer_id);

    match state.education_service.upsert(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to save education progress: {}", e);
            error_response(client_error_status(&e), e.to_string())
        }
    }
}

async fn get_education(State(state): State<AppState>, Path(new_comer_id): Path<i64>) -> Response {
    info!("GET education progress for new-comer {}", new_comer_id);

    match state.education_service.get_by_new_comer(new_comer_id).await {
        Ok(Some(education)) => (StatusCode::OK, Json(education)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Education record not found"),
        Err(e) => {
            error!("Failed to get education progress: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error retrieving education progress",
            )
        }
    }
}
