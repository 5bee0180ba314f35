//! taggery-api - HTTP ingestion server for taggery.
//!
//! Receives completed-scan callbacks from the external tagging service and
//! runs them through the tag reconciliation pipeline.

mod handlers;
mod services;

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use taggery_core::TagCache;
use taggery_db::Database;

use handlers::scans::ingest_scan_result;
use services::ScanPipeline;

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically. Useful for
/// log correlation when many webhook deliveries land at once.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    /// Scan processing pipeline; holds the store handles and the
    /// process-wide tag cache.
    pipeline: ScanPipeline,
}

/// OpenAPI documentation, served through Swagger UI at `/docs`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Taggery API",
        description = "Automated image tag ingestion: scan-result reconciliation and moderation flag derivation"
    ),
    paths(handlers::scans::ingest_scan_result),
    components(schemas(
        taggery_core::ScanResultEvent,
        taggery_core::TagObservation,
        taggery_core::TagKind,
        taggery_core::TagTarget,
    )),
    tags(
        (name = "Scans", description = "Scan-result ingestion"),
        (name = "System", description = "Health checks and system info")
    )
)]
struct ApiDoc;

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// API-level error with an HTTP status mapping.
#[derive(Debug)]
enum ApiError {
    Database(taggery_core::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
}

impl From<taggery_core::Error> for ApiError {
    fn from(err: taggery_core::Error) -> Self {
        match &err {
            taggery_core::Error::ImageNotFound(id) => {
                ApiError::NotFound(format!("Image {} not found", id))
            }
            taggery_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            taggery_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            taggery_core::Error::Database(sqlx_err) => {
                let msg = sqlx_err.to_string();
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    return ApiError::Conflict(msg);
                }
                ApiError::Database(err)
            }
            _ => ApiError::Database(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// MAIN
// =============================================================================

/// Initialize tracing from the environment.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to a daily-rotated log file (default: stdout)
///   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected)
///   RUST_LOG    - standard env filter (default: "taggery_api=debug,tower_http=debug")
///
/// Returns the appender guard when logging to a file; dropping it flushes the
/// writer, so the caller must hold it for the process lifetime.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let json = std::env::var("LOG_FORMAT").map(|v| v == "json").unwrap_or(false);
    let ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");
    let log_file = std::env::var("LOG_FILE").ok();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "taggery_api=debug,tower_http=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    let guard = match &log_file {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .and_then(|f| f.to_str())
                .unwrap_or("taggery-api.log");
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name));

            if json {
                registry
                    .with(
                        tracing_subscriber::fmt::layer()
                            .json()
                            .with_writer(writer),
                    )
                    .init();
            } else {
                registry
                    .with(
                        tracing_subscriber::fmt::layer()
                            .with_writer(writer)
                            // ANSI escapes garble files unless asked for.
                            .with_ansi(ansi.unwrap_or(false)),
                    )
                    .init();
            }
            Some(guard)
        }
        None => {
            if json {
                registry
                    .with(tracing_subscriber::fmt::layer().json())
                    .init();
            } else {
                let mut layer = tracing_subscriber::fmt::layer();
                if let Some(ansi) = ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).init();
            }
            None
        }
    };

    info!(
        json,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );
    guard
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let _log_guard = init_logging();

    // Get configuration from environment
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/taggery".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);

    // Scan events are small; default cap of 1 MiB leaves generous headroom.
    let max_body_bytes: usize = std::env::var("MAX_BODY_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1024 * 1024);

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    // Periodic pool health logging
    let metrics_pool = db.pool.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            taggery_db::log_pool_metrics(&metrics_pool);
        }
    });

    // The tag cache lives for the whole process and is shared by every
    // concurrent ingestion task.
    let cache = TagCache::new();
    let state = AppState {
        pipeline: ScanPipeline::from_database(&db, cache),
    };

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(health_check))
        // OpenAPI / Swagger UI
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Scan ingestion
        .route("/api/v1/scans/result", post(ingest_scan_result))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
