//! # New-Family Registry Backend
//!
//! Backend for church new-comer registration, education tracking, and
//! reporting. Layered the usual way:
//!
//! ```text
//! IO Layer (REST API, handlers)
//!     ↓
//! Domain Layer (services, numbering rules)
//!     ↓
//! Storage Layer (SQLite, repositories)
//! ```
//!
//! [`initialize_backend`] wires the services onto one database connection;
//! [`create_router`] mounts every resource under `/api` with CORS applied.

pub mod domain;
pub mod io;
pub mod storage;

use anyhow::Result;
use axum::{
    http::{HeaderValue, Method},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::info;

use crate::domain::{
    CodeService, EducationService, ExportService, GraduateService, NewComerService,
    StatisticsService,
};
use crate::io::rest;
use crate::storage::DbConnection;

/// Main application state that holds all services
#[derive(Clone)]
pub struct AppState {
    pub new_comer_service: NewComerService,
    pub education_service: EducationService,
    pub graduate_service: GraduateService,
    pub statistics_service: StatisticsService,
    pub export_service: ExportService,
    pub code_service: CodeService,
}

/// Initialize the backend with all required services. Pass a database URL to
/// override the default on-disk database.
pub async fn initialize_backend(database_url: Option<&str>) -> Result<AppState> {
    info!("Setting up database");
    let db = match database_url {
        Some(url) => DbConnection::new(url).await?,
        None => DbConnection::init().await?,
    };

    info!("Setting up services");
    Ok(AppState {
        new_comer_service: NewComerService::new(db.clone()),
        education_service: EducationService::new(db.clone()),
        graduate_service: GraduateService::new(db.clone()),
        statistics_service: StatisticsService::new(db.clone()),
        export_service: ExportService::new(db.clone()),
        code_service: CodeService::new(db),
    })
}

/// Create the Axum router with all routes configured
pub fn create_router(app_state: AppState, allowed_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    let api_routes = Router::new()
        .nest("/new-comers", rest::new_comer_apis::new_comer_router())
        .nest("/transfer-believers", rest::new_comer_apis::transfer_believer_router())
        .nest("/new-comer-graduates", rest::graduate_apis::new_comer_graduate_router())
        .nest("/transfer-graduates", rest::graduate_apis::transfer_graduate_router())
        .nest("/new-comer-education", rest::education_apis::router())
        .nest("/transfer-believer-education", rest::education_apis::router())
        .nest("/statistics", rest::statistics_apis::router())
        .nest("/export", rest::export_apis::router())
        .nest("/code-groups", rest::code_apis::router());

    Router::new()
        .nest("/api", api_routes)
        .layer(cors)
        .with_state(app_state)
}
