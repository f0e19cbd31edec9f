use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{models::alert::normalize_symbol, AppState};

use super::store_error;

// GET /api/quote/:symbol
pub async fn get_quote(State(state): State<AppState>, Path(symbol): Path<String>) -> Response {
    let sym = match normalize_symbol(&symbol) {
        Ok(s) => s,
        Err(e) => return store_error(e),
    };

    match state.quotes.fetch_quote(&sym).await {
        Ok(q) => (
            StatusCode::OK,
            Json(json!({
                "symbol": q.symbol,
                "price": q.price,
                "change": q.change,
                "changePercent": q.change_percent,
                "high": q.high,
                "low": q.low,
                "open": q.open,
                "previousClose": q.previous_close,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!("quote passthrough failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": "Failed to fetch quote" })),
            )
                .into_response()
        }
    }
}
