use axum::{Router, routing::post};
use crate::{AppState, controllers::digest_controller};

pub fn add_routes(router: Router<AppState>) -> Router<AppState> {
    router.route("/api/digest/run", post(digest_controller::post_run_digest))
}
