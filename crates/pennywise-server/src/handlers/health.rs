//! Health handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use pennywise_core::AIBackend;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ai: AiStatus,
}

#[derive(Debug, Serialize)]
pub struct AiStatus {
    pub configured: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reachable: Option<bool>,
}

/// GET /api/health - Server and model backend status
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let ai = match &state.ai {
        Some(client) => AiStatus {
            configured: true,
            host: Some(client.host().to_string()),
            model: Some(client.model().to_string()),
            reachable: Some(client.health_check().await),
        },
        None => AiStatus {
            configured: false,
            host: None,
            model: None,
            reachable: None,
        },
    };

    Json(HealthResponse { status: "ok", ai })
}
