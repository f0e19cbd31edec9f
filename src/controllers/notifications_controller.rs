use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{auth::unauthorized, models::CurrentUser, AppState};

use super::{parse_id, store_error};

// GET /api/notifications
pub async fn get_notifications(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized();
    };

    let limit = state.settings.notifications_limit;
    let items = match state.notifications.find_recent_by_owner(u.id, limit).await {
        Ok(v) => v,
        Err(e) => return store_error(e),
    };

    let unread = match state.notifications.unread_count(u.id).await {
        Ok(n) => n,
        Err(e) => return store_error(e),
    };

    let items: Vec<serde_json::Value> = items.iter().map(|n| n.to_json()).collect();

    (
        StatusCode::OK,
        Json(json!({ "success": true, "notifications": items, "unread": unread })),
    )
        .into_response()
}

// POST /api/notifications/:id/read
pub async fn post_mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized();
    };

    let oid = match parse_id(&id) {
        Ok(x) => x,
        Err(res) => return res,
    };

    // already read, or not the caller's: still a success
    match state.notifications.mark_read(u.id, oid).await {
        Ok(_) => (StatusCode::OK, Json(json!({ "success": true }))).into_response(),
        Err(e) => store_error(e),
    }
}
