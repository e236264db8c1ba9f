pub mod api;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::PipelineConfig;
use crate::services::intake::IntakeService;
use crate::services::job_store::JobStatusStore;
use crate::services::pipeline::PipelineOrchestrator;
use crate::services::rasterizer::Rasterizer;
use crate::services::storage::StorageService;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::health_check,
        api::handlers::upload::upload_files,
        api::handlers::jobs::convert_pdfs,
        api::handlers::jobs::conversion_status,
        api::handlers::jobs::upload_status,
    ),
    components(
        schemas(
            api::handlers::UploadFilesResponse,
            api::handlers::ConvertResponse,
            api::handlers::HealthResponse,
            services::job_store::ConversionProgress,
            services::job_store::ConversionStatus,
            services::job_store::UploadProgress,
            services::job_store::UploadStatus,
        )
    ),
    tags(
        (name = "intake", description = "Upload of source trees"),
        (name = "jobs", description = "PDF conversion jobs and their progress"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageService>,
    pub jobs: Arc<JobStatusStore>,
    pub pipeline: Arc<PipelineOrchestrator>,
    pub intake: Arc<IntakeService>,
    pub config: PipelineConfig,
}

impl AppState {
    /// Wires the job store, intake and orchestrator around the two external capabilities.
    pub fn new(
        config: PipelineConfig,
        storage: Arc<dyn StorageService>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        let jobs = Arc::new(JobStatusStore::new());
        let pipeline = Arc::new(PipelineOrchestrator::new(
            &config,
            jobs.clone(),
            rasterizer,
            storage.clone(),
        ));
        let intake = Arc::new(IntakeService::new(config.upload_dir.clone()));

        Self {
            storage,
            jobs,
            pipeline,
            intake,
            config,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/upload-files/",
            post(api::handlers::upload::upload_files).layer(
                axum::extract::DefaultBodyLimit::max(state.config.max_upload_size),
            ),
        )
        .route("/convert-pdfs/", post(api::handlers::jobs::convert_pdfs))
        .route(
            "/conversion-status/:task_id",
            get(api::handlers::jobs::conversion_status),
        )
        .route(
            "/s3-upload-status/:task_id",
            get(api::handlers::jobs::upload_status),
        )
        // Inside the request id layer so spans see the generated id
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(&api::middleware::request_id::REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
