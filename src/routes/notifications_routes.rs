use axum::{Router, routing::{get, post}};
use crate::{AppState, controllers::notifications_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/notifications", get(notifications_controller::get_notifications))
        .route("/api/notifications/:id/read", post(notifications_controller::post_mark_read))
}
