use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::unauthorized,
    models::{CurrentUser, WatchlistChange},
    services::watchlist_service,
    AppState,
};

use super::store_error;

#[derive(Deserialize)]
pub struct AddWatchRequest {
    pub symbol: String,
    #[serde(default)]
    pub company: String,
}

// GET /api/watchlist
pub async fn get_watchlist(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized();
    };

    match state.watchlist.find_by_owner(u.id).await {
        Ok(items) => {
            let items: Vec<serde_json::Value> = items.iter().map(|i| i.to_json()).collect();
            (StatusCode::OK, Json(json!({ "success": true, "items": items }))).into_response()
        }
        Err(e) => store_error(e),
    }
}

// POST /api/watchlist
pub async fn post_add_symbol(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Json(body): Json<AddWatchRequest>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized();
    };

    match state.watchlist.add(u.id, &body.symbol, &body.company).await {
        Ok((item, added)) => {
            if added {
                state.events.watchlist_changed(
                    u.id,
                    Some(WatchlistChange {
                        symbol: item.symbol.clone(),
                        is_added: true,
                    }),
                );
            }
            (
                StatusCode::OK,
                Json(json!({ "success": true, "item": item.to_json(), "added": added })),
            )
                .into_response()
        }
        Err(e) => store_error(e),
    }
}

// DELETE /api/watchlist/:symbol
pub async fn delete_symbol(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    user: Option<Extension<CurrentUser>>,
) -> Response {
    let Some(Extension(u)) = user else {
        return unauthorized();
    };

    let removed = match watchlist_service::remove_symbol(
        state.watchlist.as_ref(),
        state.alerts.as_ref(),
        u.id,
        &symbol,
    )
    .await
    {
        Ok(n) => n,
        Err(e) => return store_error(e),
    };

    let sym = symbol.trim().to_uppercase();
    state.events.watchlist_changed(
        u.id,
        Some(WatchlistChange {
            symbol: sym,
            is_added: false,
        }),
    );
    if removed > 0 {
        state.events.alerts_changed(u.id, None);
    }

    (
        StatusCode::OK,
        Json(json!({ "success": true, "removedAlerts": removed })),
    )
        .into_response()
}
