//! Scanner dashboard HTTP surface: aggregate status, the SSE event
//! stream, bootstrap, and scan/worker pool control.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event as SseEvent, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures::stream::{self, Stream};
use serde::Deserialize;
use serde_json::json;

use crate::bootstrap::run_bootstrap;
use crate::state::AppState;

pub async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.coordinator.get_status();
    Json(json!({
        "regions": snapshot.regions,
        "workers": snapshot.workers,
        "total_regions": snapshot.total_regions,
        "complete_regions": snapshot.complete_regions,
        "overall_progress": snapshot.overall_progress,
        "active_worker_threads": state.worker_pool.active_count(),
    }))
}

pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let (_id, subscriber) = state.coordinator.subscribe();

    let stream = stream::unfold(subscriber, |subscriber| async move {
        let event = tokio::task::block_in_place(|| subscriber.recv_timeout(Duration::from_secs(15)));
        let sse = match event {
            Some(event) => SseEvent::default().data(serde_json::to_string(&event).unwrap_or_default()),
            None => SseEvent::default().comment("keep-alive"),
        };
        Some((Ok(sse), subscriber))
    });

    Sse::new(stream)
}

#[derive(Deserialize)]
pub struct BootstrapRequest {
    num: usize,
}

pub async fn bootstrap(
    State(state): State<AppState>,
    Json(body): Json<BootstrapRequest>,
) -> impl IntoResponse {
    let coordinator = state.coordinator.clone();
    let login_addr = state.worker_pool.login_addr().to_string();
    let account_prefix = state.worker_pool.account_prefix().to_string();
    let password = state.worker_pool.password().to_string();

    std::thread::spawn(move || {
        run_bootstrap(coordinator, login_addr, account_prefix, password, body.num);
    });

    Json(json!({"started": true, "num": body.num}))
}

#[derive(Deserialize)]
pub struct ScanStartRequest {
    #[serde(default = "default_worker_count")]
    num_workers: usize,
    #[serde(default = "default_scan_mode")]
    mode: String,
}

fn default_worker_count() -> usize {
    1
}

fn default_scan_mode() -> String {
    "block".to_string()
}

pub async fn scan_start(
    State(state): State<AppState>,
    Json(body): Json<ScanStartRequest>,
) -> impl IntoResponse {
    let step = if body.mode == "cell" { 1 } else { 8 };
    state.coordinator.push_log(
        "info",
        format!("starting {} workers (mode={}, step={step})", body.num_workers, body.mode),
    );
    state.worker_pool.start(body.num_workers);
    Json(json!({"started": body.num_workers, "mode": body.mode}))
}

pub async fn scan_stop(State(state): State<AppState>) -> impl IntoResponse {
    state.worker_pool.stop_all();
    state.coordinator.push_log("warn", "all workers stopped");
    Json(json!({"stopped": true}))
}

#[derive(Deserialize)]
pub struct WorkerNameRequest {
    name: Option<String>,
}

pub async fn worker_add(
    State(state): State<AppState>,
    Json(body): Json<WorkerNameRequest>,
) -> impl IntoResponse {
    state.worker_pool.add_worker(body.name.clone());
    Json(json!({"added": true, "name": body.name}))
}

pub async fn worker_remove(
    State(state): State<AppState>,
    Json(body): Json<WorkerNameRequest>,
) -> impl IntoResponse {
    if let Some(name) = &body.name {
        state.worker_pool.remove_worker(name);
    }
    Json(json!({"removed": body.name}))
}

pub async fn scan_reset(State(state): State<AppState>) -> impl IntoResponse {
    match state.coordinator.reset() {
        Ok(()) => Json(json!({"reset": true})).into_response(),
        Err(err) => (axum::http::StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}
