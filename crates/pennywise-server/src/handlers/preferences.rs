//! Theme preference handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Deserialize;
use tracing::error;

use crate::{AppError, AppState};
use pennywise_core::preferences::{ResolvedTheme, Theme, ThemeUpdate};

/// GET /api/preferences/theme - Reconciled theme
pub async fn get_theme(State(state): State<Arc<AppState>>) -> Json<ResolvedTheme> {
    Json(state.preferences.resolve().await)
}

#[derive(Debug, Deserialize)]
pub struct SetThemeRequest {
    pub theme: String,
}

/// PUT /api/preferences/theme - Change the theme
pub async fn set_theme(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SetThemeRequest>, JsonRejection>,
) -> Result<Json<ThemeUpdate>, AppError> {
    let Json(body) = body.map_err(|e| AppError::bad_request(&e.body_text()))?;
    let theme: Theme = body.theme.parse().map_err(AppError::input)?;

    let update = state.preferences.set(theme).await.map_err(|e| {
        error!(error = %e, "Failed to write theme cache");
        AppError::internal("Failed to save theme")
    })?;

    Ok(Json(update))
}
