//! Route table: editor endpoints under `/api/region`, scanner dashboard
//! endpoints under `/api`, and the static shell for anything else.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{editor, scan};
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/regions", get(editor::list_regions))
        .route("/api/region/:name/info", get(editor::region_info))
        .route("/api/region/:name/render", get(editor::region_render))
        .route("/api/region/:name/cell", get(editor::region_cell))
        .route("/api/region/:name/detail", get(editor::region_detail))
        .route("/api/region/:name/edit", post(editor::edit_cell))
        .route("/api/region/:name/unblock", post(editor::unblock_area))
        .route("/api/region/:name/save", post(editor::save_region))
        .route("/api/world2geo", get(editor::world2geo))
        .route("/api/status", get(scan::status))
        .route("/api/events", get(scan::events))
        .route("/api/bootstrap", post(scan::bootstrap))
        .route("/api/scan/start", post(scan::scan_start))
        .route("/api/scan/stop", post(scan::scan_stop))
        .route("/api/scan/reset", post(scan::scan_reset))
        .route("/api/worker/add", post(scan::worker_add))
        .route("/api/worker/remove", post(scan::worker_remove))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
