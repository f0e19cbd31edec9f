use axum::{Router, routing::post};
use crate::{AppState, controllers::monitor_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router.route("/api/monitor/run", post(monitor_controller::post_run_monitor))
}
