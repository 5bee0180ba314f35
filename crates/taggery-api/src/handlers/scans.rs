//! Scan-result webhook handlers.
//!
//! The external tagging service calls back here once per scanned image.
//! Signature/auth verification is handled upstream (reverse proxy); this
//! handler owns deserialization and pipeline dispatch only.

use axum::{extract::State, Json};
use serde::Serialize;

use taggery_core::ScanResultEvent;

use crate::services::ScanOutcome;
use crate::{ApiError, AppState};

/// Acknowledgment returned to the tagging service.
#[derive(Debug, Serialize)]
pub struct ScanResultResponse {
    pub ok: bool,
}

/// Ingest one completed-scan event.
///
/// Invalid images are purged; valid images get their automated tag set
/// rebuilt from the observations and their moderation flag recomputed.
///
/// # Returns
/// - 200 OK on completion (including "image purged" and "nothing to do")
/// - 400 Bad Request for a malformed event
/// - 404 Not Found when the image vanished mid-processing
/// - 500 Internal Server Error on a storage fault
#[utoipa::path(post, path = "/api/v1/scans/result", tag = "Scans",
    request_body = ScanResultEvent,
    responses(
        (status = 200, description = "Scan result processed"),
        (status = 400, description = "Malformed event"),
        (status = 404, description = "Image vanished during processing"),
        (status = 500, description = "Storage fault during upsert or flag update"),
    ))]
pub async fn ingest_scan_result(
    State(state): State<AppState>,
    Json(event): Json<ScanResultEvent>,
) -> Result<Json<ScanResultResponse>, ApiError> {
    let outcome = state.pipeline.process(&event).await?;

    if let ScanOutcome::Processed { applied } = outcome {
        tracing::debug!(
            subsystem = "api",
            component = "scans",
            op = "ingest",
            image_id = event.id,
            tag_count = applied,
            "Scan event acknowledged"
        );
    }

    Ok(Json(ScanResultResponse { ok: true }))
}
