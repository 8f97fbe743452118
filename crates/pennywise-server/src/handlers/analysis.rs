//! Financial analysis handler

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;

use crate::{AppError, AppState};
use pennywise_core::{AnalysisReport, FinancialProfileBundle, HealthBand, Pipeline};

/// Report plus its display band
#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    #[serde(flatten)]
    pub report: AnalysisReport,
    pub band: HealthBand,
}

/// POST /api/analysis - Financial health report for a profile bundle
pub async fn analyze_finances(
    State(state): State<Arc<AppState>>,
    body: Result<Json<FinancialProfileBundle>, JsonRejection>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let Json(bundle) = body.map_err(|e| AppError::bad_request(&e.body_text()))?;

    let analyzer = state.analyzer.as_ref().ok_or_else(AppError::not_configured)?;
    let report = analyzer
        .analyze(&bundle)
        .await
        .map_err(|e| AppError::pipeline_in(e, Pipeline::Analysis))?;

    Ok(Json(AnalysisResponse {
        band: report.band(),
        report,
    }))
}
