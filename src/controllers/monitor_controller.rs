use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::AppState;

// POST /api/monitor/run
pub async fn post_run_monitor(State(state): State<AppState>) -> Response {
    // a pending permit coalesces repeated requests into one extra run
    state.monitor_trigger.notify_one();

    (StatusCode::ACCEPTED, Json(json!({ "success": true }))).into_response()
}
