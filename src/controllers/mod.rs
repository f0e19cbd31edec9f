use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use mongodb::bson::oid::ObjectId;
use serde_json::json;

use crate::error::StoreError;

pub mod alerts_controller;
pub mod digest_controller;
pub mod home_controller;
pub mod monitor_controller;
pub mod notifications_controller;
pub mod quote_controller;
pub mod realtime_controller;
pub mod watchlist_controller;

/// `{success: false, error}` with a status matching the failure class.
pub(crate) fn store_error(e: StoreError) -> Response {
    let status = match &e {
        StoreError::DuplicateAlert => StatusCode::CONFLICT,
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Invalid(_) => StatusCode::BAD_REQUEST,
        StoreError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let msg = if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("request failed: {}", e);
        "Something went wrong, please try again.".to_string()
    } else {
        e.to_string()
    };

    (status, Json(json!({ "success": false, "error": msg }))).into_response()
}

pub(crate) fn parse_id(id: &str) -> Result<ObjectId, Response> {
    ObjectId::parse_str(id.trim()).map_err(|_| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "bad id" })),
        )
            .into_response()
    })
}
