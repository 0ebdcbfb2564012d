//! # API REST
//!
//! REST API implementation for the close-out forms service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialization, CORS, request tracing, status codes)
//!
//! Uses `api-shared` for wire types and `closeout-core` for everything else.

#![warn(rust_2018_idioms)]

pub mod bootstrap;
pub mod error;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::{
    CreateReportReq, CreateReportRes, ErrorRes, HealthRes, HealthService, SectionReq, UploadReq,
    UploadRes,
};
use closeout_core::validation::{validate_report_request, validate_upload_request};
use closeout_core::{FormsService, Section, UploadOutcome};

pub use error::ApiError;

/// Largest request body accepted by default. Uploads arrive base64-encoded inside JSON, so
/// this admits photos of roughly 24 MiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Application state for the REST API server
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<FormsService>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(service: FormsService) -> Self {
        Self {
            service: Arc::new(service),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, create_report, upload),
    components(schemas(
        HealthRes,
        SectionReq,
        CreateReportReq,
        CreateReportRes,
        UploadReq,
        UploadRes,
        ErrorRes,
    ))
)]
pub struct ApiDoc;

/// Builds the application router with documentation, CORS, request tracing and the body
/// size limit from `state`.
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/health", get(health))
        .route("/api/create-report", post(create_report))
        .route("/api/upload", post(upload))
        .layer(DefaultBodyLimit::max(body_limit))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Binds `addr` and serves the router until the server stops.
///
/// # Errors
/// Returns an error if the address cannot be bound or the server fails while running.
pub async fn serve(addr: &str, state: AppState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("++ Closeout REST listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/api/create-report",
    request_body = CreateReportReq,
    responses(
        (status = 200, description = "Report published", body = CreateReportRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 502, description = "Object store rejected the credentials", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Compose, publish and share a close-out report
///
/// Renders the checklist against the images in `{root}/{folderName}`, writes the document
/// to `{root}/{folderName}/report.html` (replacing any previous one) and returns a public
/// link that renders it in a browser.
///
/// # Errors
/// Returns `400 Bad Request` if a field is missing or malformed, `502 Bad Gateway` if the
/// store rejects the credentials, and `500 Internal Server Error` for any other failure.
#[axum::debug_handler]
async fn create_report(
    State(state): State<AppState>,
    payload: Result<Json<CreateReportReq>, JsonRejection>,
) -> Result<Json<CreateReportRes>, ApiError> {
    let Json(req) = payload?;
    let sections = req
        .sections
        .map(|sections| sections.into_iter().map(section_from_wire).collect());
    let request = validate_report_request(
        req.folder_name.as_deref(),
        req.employee_name.as_deref(),
        sections,
    )?;

    let link = state.service.create_report(request).await?;
    Ok(Json(CreateReportRes { link: link.url }))
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body = UploadReq,
    responses(
        (status = 200, description = "Workspace allocated or file uploaded", body = UploadRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 413, description = "Request body too large", body = ErrorRes),
        (status = 502, description = "Object store rejected the credentials", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Allocate a workspace, or upload a file into it
///
/// Without `fileName` and `fileData` the workspace `{root}/{folderName}` is allocated, moving
/// any previous submission aside, and its path is returned. With both, the base64 payload is
/// written to `{root}/{folderName}/{fileName}`.
#[axum::debug_handler]
async fn upload(
    State(state): State<AppState>,
    payload: Result<Json<UploadReq>, JsonRejection>,
) -> Result<Json<UploadRes>, ApiError> {
    let Json(req) = payload?;
    let request = validate_upload_request(
        req.folder_name.as_deref(),
        req.file_name.as_deref(),
        req.file_data.as_deref(),
    )?;

    let res = match state.service.allocate_and_upload(request).await? {
        UploadOutcome::Allocated(workspace) => UploadRes::allocated(workspace.resolved_path),
        UploadOutcome::Uploaded { .. } => UploadRes::uploaded(),
    };
    Ok(Json(res))
}

fn section_from_wire(section: SectionReq) -> Section {
    Section {
        text: section.text,
        done: section.done,
        images: section.images,
    }
}
