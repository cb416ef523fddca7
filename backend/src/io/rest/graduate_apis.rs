//! # REST API for Graduates
//!
//! Endpoints for the promoted-registrant table: listing, certificate print
//! tracking, and the deletion path that corrects a mistaken promotion.
//! Served under `/new-comer-graduates` and `/transfer-graduates`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tracing::{error, info};

use crate::io::rest::{client_error_status, error_response};
use crate::AppState;
use shared::BelieverType;

/// Query parameters for the graduate list endpoint
#[derive(Debug, Deserialize)]
pub struct GraduateListQuery {
    pub year: Option<i32>,
    pub department: Option<String>,
}

/// Router for `/api/new-comer-graduates`
pub fn new_comer_graduate_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_new_believer_graduates))
        .route("/:id", get(get_graduate).delete(delete_graduate))
        .route("/:id/print", post(print_graduate))
}

/// Router for `/api/transfer-graduates`
pub fn transfer_graduate_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_transfer_believer_graduates))
        .route("/:id", get(get_graduate).delete(delete_graduate))
        .route("/:id/print", post(print_graduate))
}

async fn list_new_believer_graduates(
    State(state): State<AppState>,
    Query(query): Query<GraduateListQuery>,
) -> Response {
    list_graduates(state, BelieverType::NewBeliever, query).await
}

async fn list_transfer_believer_graduates(
    State(state): State<AppState>,
    Query(query): Query<GraduateListQuery>,
) -> Response {
    list_graduates(state, BelieverType::TransferredBeliever, query).await
}

async fn list_graduates(
    state: AppState,
    believer_type: BelieverType,
    query: GraduateListQuery,
) -> Response {
    info!("GET graduates of {} - query: {:?}", believer_type.as_str(), query);

    match state
        .graduate_service
        .list(believer_type, query.year, query.department)
        .await
    {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to list graduates: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error listing graduates")
        }
    }
}

async fn get_graduate(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    info!("GET graduate {}", id);

    match state.graduate_service.get(id).await {
        Ok(Some(graduate)) => (StatusCode::OK, Json(graduate)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Graduate not found"),
        Err(e) => {
            error!("Failed to get graduate: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error retrieving graduate")
        }
    }
}

async fn print_graduate(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    info!("POST print graduate {}", id);

    match state.graduate_service.print(id).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to record certificate print: {}", e);
            error_response(client_error_status(&e), e.to_string())
        }
    }
}

async fn delete_graduate(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    info!("DELETE graduate {}", id);

    match state.graduate_service.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to delete graduate: {}", e);
            error_response(client_error_status(&e), e.to_string())
        }
    }
}
