//! Currency conversion handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};
use pennywise_core::currency::{Conversion, BASE_CURRENCY};

#[derive(Debug, Deserialize)]
pub struct ConvertQuery {
    pub amount: f64,
    pub from: String,
    pub to: String,
}

/// GET /api/currency/convert?amount=&from=&to= - Convert an amount
pub async fn convert_currency(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ConvertQuery>, QueryRejection>,
) -> Result<Json<Conversion>, AppError> {
    let Query(query) = query.map_err(|e| AppError::bad_request(&e.body_text()))?;

    let conversion = state
        .currency
        .convert(query.amount, &query.from, &query.to)
        .await
        .map_err(AppError::input)?;

    Ok(Json(conversion))
}

#[derive(Debug, Serialize)]
pub struct CurrenciesResponse {
    pub base: &'static str,
    pub codes: Vec<String>,
}

/// GET /api/currencies - Supported currency codes
pub async fn list_currencies(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CurrenciesResponse>, AppError> {
    let codes = state.currency.supported().await?;
    Ok(Json(CurrenciesResponse {
        base: BASE_CURRENCY,
        codes,
    }))
}
