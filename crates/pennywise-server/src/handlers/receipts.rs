//! Receipt scanning handler

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    Json,
};

use crate::{AppError, AppState, MAX_UPLOAD_SIZE};
use pennywise_core::pipeline::MANUAL_ENTRY_FALLBACK;
use pennywise_core::{ExtractionResult, ImagePayload, Pipeline};

/// POST /api/receipts/scan - Extract an expense candidate from a receipt image
///
/// The body is the raw image; `Content-Type` carries its media type.
/// Every failure response includes the manual-entry fallback.
pub async fn scan_receipt(
    State(state): State<Arc<AppState>>,
    request: Request,
) -> Result<Json<ExtractionResult>, AppError> {
    let scanner = state
        .scanner
        .as_ref()
        .ok_or_else(|| AppError::not_configured().with_fallback(MANUAL_ENTRY_FALLBACK))?;

    let media_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AppError::bad_request("Content-Type must be the image media type")
                .with_fallback(MANUAL_ENTRY_FALLBACK)
        })?;

    if !media_type.starts_with("image/") {
        return Err(
            AppError::bad_request(&format!("Unsupported media type: {}", media_type))
                .with_fallback(MANUAL_ENTRY_FALLBACK),
        );
    }

    let bytes = axum::body::to_bytes(request.into_body(), MAX_UPLOAD_SIZE)
        .await
        .map_err(|_| {
            AppError::bad_request("Invalid request body or file too large (max 10MB)")
                .with_fallback(MANUAL_ENTRY_FALLBACK)
        })?;

    if bytes.is_empty() {
        return Err(
            AppError::bad_request("No image data provided").with_fallback(MANUAL_ENTRY_FALLBACK)
        );
    }

    let result = scanner
        .scan(ImagePayload::new(bytes.to_vec(), media_type))
        .await
        .map_err(|e| {
            AppError::pipeline_in(e, Pipeline::Extraction).with_fallback(MANUAL_ENTRY_FALLBACK)
        })?;

    Ok(Json(result))
}
