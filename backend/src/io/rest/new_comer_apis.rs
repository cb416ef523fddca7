//! # REST API for New-Comer Management
//!
//! The same handlers serve two route prefixes: `/new-comers` for new
//! believers and `/transfer-believers` for transferred believers. The
//! prefix fixes the believer type; updates may still move a registrant
//! across types, which triggers the renumbering transition.

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
use shared::{
    BelieverType, CreateNewComerRequest, EducationType, GenerateNumberRequest,
    ReorderNumbersRequest, UpdateNewComerRequest,
};

/// Query parameters for the list endpoint
#[derive(Debug, Deserialize)]
pub struct NewComerListQuery {
    pub year: Option<i32>,
    pub department: Option<String>,
    pub education_type: Option<EducationType>,
    pub name: Option<String>,
}

/// Query parameters for the duplicate check
#[derive(Debug, Deserialize)]
pub struct CheckDuplicateQuery {
    pub name: String,
    pub birth_date: String,
}

/// Router for `/api/new-comers`
pub fn new_comer_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_new_believers).post(create_new_believer))
        .route("/generate-number", post(generate_new_believer_number))
        .route("/reorder-numbers", post(reorder_new_believer_numbers))
        .route("/check-duplicate", get(check_duplicate))
        .route("/audit-numbers/:year", get(audit_numbers))
        .route(
            "/:id",
            get(get_new_comer).put(update_new_comer).delete(delete_new_comer),
        )
        .route("/:id/graduate", post(promote_new_comer))
}

/// Router for `/api/transfer-believers`
pub fn transfer_believer_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_transfer_believers).post(create_transfer_believer))
        .route("/generate-number", post(generate_transfer_believer_number))
        .route("/reorder-numbers", post(reorder_transfer_believer_numbers))
        .route("/check-duplicate", get(check_duplicate))
        .route("/audit-numbers/:year", get(audit_numbers))
        .route(
            "/:id",
            get(get_new_comer).put(update_new_comer).delete(delete_new_comer),
        )
        .route("/:id/graduate", post(promote_new_comer))
}

async fn list_new_believers(
    State(state): State<AppState>,
    Query(query): Query<NewComerListQuery>,
) -> Response {
    list_new_comers(state, BelieverType::NewBeliever, query).await
}

async fn list_transfer_believers(
    State(state): State<AppState>,
    Query(query): Query<NewComerListQuery>,
) -> Response {
    list_new_comers(state, BelieverType::TransferredBeliever, query).await
}

async fn create_new_believer(
    State(state): State<AppState>,
    Json(request): Json<CreateNewComerRequest>,
) -> Response {
    create_new_comer(state, BelieverType::NewBeliever, request).await
}

async fn create_transfer_believer(
    State(state): State<AppState>,
    Json(request): Json<CreateNewComerRequest>,
) -> Response {
    create_new_comer(state, BelieverType::TransferredBeliever, request).await
}

async fn generate_new_believer_number(
    State(state): State<AppState>,
    Json(request): Json<GenerateNumberRequest>,
) -> Response {
    generate_number(state, BelieverType::NewBeliever, request).await
}

async fn generate_transfer_believer_number(
    State(state): State<AppState>,
    Json(request): Json<GenerateNumberRequest>,
) -> Response {
    generate_number(state, BelieverType::TransferredBeliever, request).await
}

async fn reorder_new_believer_numbers(
    State(state): State<AppState>,
    Json(request): Json<ReorderNumbersRequest>,
) -> Response {
    reorder_numbers(state, BelieverType::NewBeliever, request).await
}

async fn reorder_transfer_believer_numbers(
    State(state): State<AppState>,
    Json(request): Json<ReorderNumbersRequest>,
) -> Response {
    reorder_numbers(state, BelieverType::TransferredBeliever, request).await
}

async fn list_new_comers(
    state: AppState,
    believer_type: BelieverType,
    query: NewComerListQuery,
) -> Response {
    info!("GET list of {} - query: {:?}", believer_type.as_str(), query);

    match state
        .new_comer_service
        .list(
            believer_type,
            query.year,
            query.department,
            query.education_type,
            query.name,
        )
        .await
    {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to list new-comers: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error listing new-comers")
        }
    }
}

async fn create_new_comer(
    state: AppState,
    believer_type: BelieverType,
    request: CreateNewComerRequest,
) -> Response {
    info!("POST create {} - request: {:?}", believer_type.as_str(), request);

    match state.new_comer_service.create(believer_type, request).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to create new-comer: {}", e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

async fn get_new_comer(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    info!("GET new-comer {}", id);

    match state.new_comer_service.get(id).await {
        Ok(Some(person)) => (StatusCode::OK, Json(person)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "New-comer not found"),
        Err(e) => {
            error!("Failed to get new-comer: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error retrieving new-comer")
        }
    }
}

async fn update_new_comer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateNewComerRequest>,
) -> Response {
    info!("PUT new-comer {} - request: {:?}", id, request);

    match state.new_comer_service.update(id, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to update new-comer: {}", e);
            error_response(client_error_status(&e), e.to_string())
        }
    }
}

async fn delete_new_comer(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    info!("DELETE new-comer {}", id);

    match state.new_comer_service.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            error!("Failed to delete new-comer: {}", e);
            error_response(client_error_status(&e), e.to_string())
        }
    }
}

async fn generate_number(
    state: AppState,
    believer_type: BelieverType,
    request: GenerateNumberRequest,
) -> Response {
    info!(
        "POST generate-number for {} - request: {:?}",
        believer_type.as_str(),
        request
    );

    match state.new_comer_service.generate_number(believer_type, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to generate number: {}", e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

async fn reorder_numbers(
    state: AppState,
    believer_type: BelieverType,
    request: ReorderNumbersRequest,
) -> Response {
    info!(
        "POST reorder-numbers for {} - request: {:?}",
        believer_type.as_str(),
        request
    );

    match state.new_comer_service.reorder_numbers(believer_type, request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to reorder numbers: {}", e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

async fn check_duplicate(
    State(state): State<AppState>,
    Query(query): Query<CheckDuplicateQuery>,
) -> Response {
    info!("GET check-duplicate - name: {}", query.name);

    match state
        .graduate_service
        .check_duplicate(&query.name, &query.birth_date)
        .await
    {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to check duplicates: {}", e);
            error_response(StatusCode::BAD_REQUEST, e.to_string())
        }
    }
}

async fn audit_numbers(State(state): State<AppState>, Path(year): Path<i32>) -> Response {
    info!("GET audit-numbers for {}", year);

    match state.new_comer_service.audit_numbers(year).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to audit numbers: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Error auditing numbers")
        }
    }
}

async fn promote_new_comer(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    info!("POST promote new-comer {}", id);

    match state.graduate_service.promote(id).await {
        Ok(response) => (StatusCode::CREATED, Json(response)).into_response(),
        Err(e) => {
            error!("Failed to promote new-comer: {}", e);
            error_response(client_error_status(&e), e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        CodeService, EducationService, ExportService, GraduateService, NewComerService,
        StatisticsService,
    };
    use crate::storage::DbConnection;

    async fn setup_test_state() -> AppState {
        let db = DbConnection::init_test().await.expect("Failed to create test database");
        AppState {
            new_comer_service: NewComerService::new(db.clone()),
            education_service: EducationService::new(db.clone()),
            graduate_service: GraduateService::new(db.clone()),
            statistics_service: StatisticsService::new(db.clone()),
            export_service: ExportService::new(db.clone()),
            code_service: CodeService::new(db),
        }
    }

    fn create_request(name: &str) -> CreateNewComerRequest {
        CreateNewComerRequest {
            department: "새가족위원회".to_string(),
            year: 2025,
            name: name.to_string(),
            gender: None,
            marital_status: None,
            birth_date: None,
            address: None,
            phone: None,
            teacher: None,
            register_date: None,
            affiliation: None,
            belong: None,
            identity_verified: None,
            previous_church: None,
            comment: None,
            education_start_date: None,
            education_end_date: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_handlers() {
        let state = setup_test_state().await;

        let response =
            create_new_believer(State(state.clone()), Json(create_request("김철수"))).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = get_new_comer(State(state), Path(1)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_handler_rejects_invalid_request() {
        let state = setup_test_state().await;

        let mut request = create_request("김철수");
        request.department = "".to_string();
        let response = create_new_believer(State(state), Json(request)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_missing_new_comer_returns_404() {
        let state = setup_test_state().await;

        let response = get_new_comer(State(state), Path(999)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_promote_handler_flow() {
        let state = setup_test_state().await;

        create_new_believer(State(state.clone()), Json(create_request("김철수"))).await;

        let response = promote_new_comer(State(state.clone()), Path(1)).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        // A second promotion of the same registrant is a client error
        let response = promote_new_comer(State(state), Path(1)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
