//! # REST API for Statistics
//!
//! Read endpoints for the snapshot tables plus the calculate action that
//! rebuilds them from the registrant and graduate tables.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tracing::{error, info};

use crate::io::rest::error_response;
use crate::AppState;
use shared::CalculateStatisticsRequest;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/yearly/:year", get(yearly_statistics))
        .route("/monthly-age/:year", get(monthly_age_statistics))
        .route("/calculate", post(calculate_statistics))
}

async fn yearly_statistics(State(state): State<AppState>, Path(year): Path<i32>) -> Response {
    info!("GET yearly statistics for {}", year);

    match state.statistics_service.yearly(year).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to get yearly statistics: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error retrieving statistics")
        }
    }
}

async fn monthly_age_statistics(State(state): State<AppState>, Path(year): Path<i32>) -> Response {
    info!("GET monthly age statistics for {}", year);

    match state.statistics_service.monthly_age(year).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to get monthly age statistics: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error retrieving statistics")
        }
    }
}

async fn calculate_statistics(
    State(state): State<AppState>,
    Json(request): Json<CalculateStatisticsRequest>,
) -> Response {
    info!("POST calculate statistics - request: {:?}", request);

    match state.statistics_service.calculate(request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to calculate statistics: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error calculating statistics")
        }
    }
}
