use axum::{
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use mongodb::bson::oid::ObjectId;
use serde_json::json;

use crate::{models::CurrentUser, AppState};

/// Header carrying the caller's user id. Sessions are handled upstream; this
/// service trusts the id and only checks that the user exists.
pub const USER_ID_HEADER: &str = "x-user-id";

fn header_user_id(headers: &HeaderMap) -> Option<ObjectId> {
    let raw = headers.get(USER_ID_HEADER)?.to_str().ok()?;
    ObjectId::parse_str(raw.trim()).ok()
}

pub async fn inject_current_user(
    State(state): State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if let Some(user_id) = header_user_id(req.headers()) {
        match state.users.find_by_id(user_id).await {
            Ok(Some(user)) => {
                // Store user in request extensions so handlers can access it
                req.extensions_mut().insert(CurrentUser::from(user));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("user lookup failed: {}", e),
        }
    }

    next.run(req).await
}

fn is_public_path(path: &str) -> bool {
    path == "/health"
}

pub async fn require_user(req: Request<axum::body::Body>, next: Next) -> Response {
    if is_public_path(req.uri().path()) || req.extensions().get::<CurrentUser>().is_some() {
        return next.run(req).await;
    }

    unauthorized()
}

pub fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "success": false, "error": "Unauthorized" })),
    )
        .into_response()
}
