use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::AppState;

// POST /api/digest/run
pub async fn post_run_digest(State(state): State<AppState>) -> Response {
    state.digest_trigger.notify_one();

    (StatusCode::ACCEPTED, Json(json!({ "success": true }))).into_response()
}
