//! Reference data handler

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::AppState;
use pennywise_core::ReferenceData;

/// GET /api/reference - Categories, payment apps and banks
pub async fn get_reference(State(state): State<Arc<AppState>>) -> Json<ReferenceData> {
    Json(state.reference.clone())
}
