use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::unauthorized,
    models::{AlertPatch, CurrentUser, Direction, NewAlert},
    AppState,
};

use super::{parse_id, store_error};

#[derive(Deserialize)]
pub struct ListQuery {
    pub symbol: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRequest {
    pub symbol: String,
    #[serde(default)]
    pub company: String,
    pub alert_name: String,
    #[serde(alias = "alertType", alias = "condition")]
    pub direction: Direction,
    pub threshold: Decimal,
}

// GET /api/alerts?symbol=AAPL
pub async fn get_alerts(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized();
    };

    let res = match q.symbol.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(sym) => state.alerts.find_by_owner_and_symbol(u.id, sym).await,
        None => state.alerts.find_by_owner(u.id).await,
    };

    match res {
        Ok(alerts) => {
            let items: Vec<serde_json::Value> = alerts.iter().map(|a| a.to_json()).collect();
            (StatusCode::OK, Json(json!({ "success": true, "alerts": items }))).into_response()
        }
        Err(e) => store_error(e),
    }
}

// POST /api/alerts
pub async fn post_create_alert(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Json(body): Json<CreateAlertRequest>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized();
    };

    let new = NewAlert {
        user_id: u.id,
        symbol: body.symbol,
        company: body.company,
        alert_name: body.alert_name,
        direction: body.direction,
        threshold: body.threshold,
    };

    match state.alerts.create(new).await {
        Ok(alert) => {
            let view = alert.to_json();
            state.events.alerts_changed(u.id, Some(alert));
            (StatusCode::CREATED, Json(json!({ "success": true, "alert": view }))).into_response()
        }
        Err(e) => store_error(e),
    }
}

// PATCH /api/alerts/:id
pub async fn patch_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
    user: Option<Extension<CurrentUser>>,
    Json(patch): Json<AlertPatch>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized();
    };

    let oid = match parse_id(&id) {
        Ok(x) => x,
        Err(res) => return res,
    };

    match state.alerts.update(u.id, oid, patch).await {
        Ok(alert) => {
            let view = alert.to_json();
            state.events.alerts_changed(u.id, Some(alert));
            (StatusCode::OK, Json(json!({ "success": true, "alert": view }))).into_response()
        }
        Err(e) => store_error(e),
    }
}

// DELETE /api/alerts/:id
pub async fn delete_alert(
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

    // someone else's (or an already retired) alert is a silent no-op
    match state.alerts.delete(u.id, oid).await {
        Ok(deleted) => {
            if deleted {
                state.events.alerts_changed(u.id, None);
            }
            (StatusCode::OK, Json(json!({ "success": true }))).into_response()
        }
        Err(e) => store_error(e),
    }
}
