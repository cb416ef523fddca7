//! # REST API for Reference Codes
//!
//! CRUD for code groups and their detail codes under `/code-groups`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use tracing::{error, info};

use crate::io::rest::{client_error_status, error_response};
use crate::AppState;
use shared::{
    CreateCodeDetailRequest, CreateCodeGroupRequest, UpdateCodeDetailRequest,
    UpdateCodeGroupRequest,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_groups).post(create_group))
        .route("/:id", get(get_group).put(update_group).delete(delete_group))
        .route("/:id/details", get(list_details).post(create_detail))
        .route("/details/:id", axum::routing::put(update_detail).delete(delete_detail))
}

async fn list_groups(State(state): State<AppState>) -> Response {
    info!("GET /api/code-groups");

    match state.code_service.list_groups().await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to list code groups: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error listing code groups")
        }
    }
}

async fn create_group(
    State(state): State<AppState>,
    Json(request): Json<CreateCodeGroupRequest>,
) -> Response {
    info!("POST /api/code-groups - request: {:?}", request);

    match state.code_service.create_group(request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to create code group: {}", e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

async fn get_group(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    info!("GET /api/code-groups/{}", id);

    match state.code_service.get_group(id).await {
        Ok(Some(group)) => (StatusCode::OK, Json(group)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "Code group not found"),
        Err(e) => {
            error!("Failed to get code group: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error retrieving code group")
        }
    }
}

async fn update_group(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateCodeGroupRequest>,
) -> Response {
    info!("PUT /api/code-groups/{} - request: {:?}", id, request);

    match state.code_service.update_group(id, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to update code group: {}", e);
            error_response(client_error_status(&e), e.to_string())
        }
    }
}

async fn delete_group(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    info!("DELETE /api/code-groups/{}", id);

    match state.code_service.delete_group(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to delete code group: {}", e);
            error_response(client_error_status(&e), e.to_string())
        }
    }
}

async fn list_details(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    info!("GET /api/code-groups/{}/details", id);

    match state.code_service.list_details(id).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to list code details: {}", e);
            error_response(client_error_status(&e), e.to_string())
        }
    }
}

async fn create_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<CreateCodeDetailRequest>,
) -> Response {
    info!("POST /api/code-groups/{}/details - request: {:?}", id, request);

    match state.code_service.create_detail(id, request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to create code detail: {}", e);
            error_response(client_error_status(&e), e.to_string())
        }
    }
}

async fn update_detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateCodeDetailRequest>,
) -> Response {
    info!("PUT /api/code-groups/details/{} - request: {:?}", id, request);

    match state.code_service.update_detail(id, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to update code detail: {}", e);
            error_response(client_error_status(&e), e.to_string())
        }
    }
}

async fn delete_detail(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    info!("DELETE /api/code-groups/details/{}", id);

    match state.code_service.delete_detail(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to delete code detail: {}", e);
            error_response(client_error_status(&e), e.to_string())
        }
    }
}
