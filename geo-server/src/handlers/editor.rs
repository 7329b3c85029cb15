//! Editor HTTP surface: region listing, inspection, rendering, cell
//! edits, area unblock, and save-to-disk.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use geo_editor::render::{render, RenderMode};

use crate::state::AppState;

fn region_name_from_path(name: &str) -> &str {
    name.strip_suffix(".l2d").unwrap_or(name)
}

pub async fn list_regions(State(state): State<AppState>) -> Json<Vec<String>> {
    let status = state.coordinator.get_status();
    let names = status
        .regions
        .into_iter()
        .map(|r| format!("{}_{}.l2d", r.region_x, r.region_y))
        .collect();
    Json(names)
}

pub async fn region_info(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let name = region_name_from_path(&name);
    match state.load_region(name) {
        Ok(Some(region)) => Json(region.stats()).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "region not found").into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
pub struct RenderQuery {
    #[serde(default = "default_mode")]
    mode: String,
}

fn default_mode() -> String {
    "heightmap".to_string()
}

pub async fn region_render(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<RenderQuery>,
) -> Response {
    let name = region_name_from_path(&name);
    let Some(mode) = RenderMode::parse(&query.mode) else {
        return (StatusCode::BAD_REQUEST, "unknown render mode").into_response();
    };
    match state.load_region(name) {
        Ok(Some(region)) => match geo_editor::render::encode_png(&render(&region, mode)) {
            Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
            Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
        },
        Ok(None) => (StatusCode::NOT_FOUND, "region not found").into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
pub struct CellQuery {
    cx: i64,
    cy: i64,
}

pub async fn region_cell(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<CellQuery>,
) -> Response {
    let name = region_name_from_path(&name);
    match state.load_region(name) {
        Ok(Some(region)) => match geo_editor::inspect_cell(&region, query.cx, query.cy) {
            Ok(inspection) => {
                let layers = region.get_layers(query.cx as usize, query.cy as usize);
                Json(json!({
                    "cell": inspection,
                    "layers": layers.iter().map(|c| json!({
                        "height": c.height,
                        "nswe": c.nswe,
                        "direction_string": c.direction_string(),
                    })).collect::<Vec<_>>(),
                }))
                .into_response()
            }
            Err(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
        },
        Ok(None) => (StatusCode::NOT_FOUND, "region not found").into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
pub struct DetailQuery {
    cx: i64,
    cy: i64,
    #[serde(default = "default_radius")]
    radius: i64,
}

fn default_radius() -> i64 {
    16
}

pub async fn region_detail(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<DetailQuery>,
) -> Response {
    let name = region_name_from_path(&name);
    match state.load_region(name) {
        Ok(Some(region)) => {
            let img = geo_editor::render::render_cell_detail(&region, query.cx, query.cy, query.radius, 20);
            match geo_editor::render::encode_png(&img) {
                Ok(bytes) => ([(header::CONTENT_TYPE, "image/png")], bytes).into_response(),
                Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
            }
        }
        Ok(None) => (StatusCode::NOT_FOUND, "region not found").into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
pub struct EditRequest {
    cx: i64,
    cy: i64,
    #[serde(default)]
    layer: usize,
    height: Option<i16>,
    nswe: Option<u8>,
}

pub async fn edit_cell(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<EditRequest>,
) -> Response {
    let name = region_name_from_path(&name);
    let result = state.with_region_mut(name, |region| {
        let current = region.get_cell(body.cx as usize, body.cy as usize, body.layer);
        let height = body.height.unwrap_or(current.height);
        let nswe = body.nswe.unwrap_or(current.nswe);
        geo_editor::edit_cell(region, body.cx, body.cy, body.layer, height, nswe)
    });

    match result {
        Ok(Some(Ok(()))) => Json(json!({"ok": true})).into_response(),
        Ok(Some(Err(err))) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "region not found").into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
pub struct UnblockRequest {
    cx: i64,
    cy: i64,
    radius: i64,
}

pub async fn unblock_area(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<UnblockRequest>,
) -> Response {
    let name = region_name_from_path(&name);
    let result = state.with_region_mut(name, |region| {
        geo_editor::unblock_area(region, body.cx, body.cy, body.radius)
    });

    match result {
        Ok(Some(Ok(modified))) => Json(json!({"modified": modified})).into_response(),
        Ok(Some(Err(err))) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, "region not found").into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

pub async fn save_region(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let name = region_name_from_path(&name);
    match state.save_region(name) {
        Ok(true) => Json(json!({"saved": true})).into_response(),
        Ok(false) => (StatusCode::NOT_FOUND, "region not loaded").into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
pub struct World2GeoQuery {
    x: i64,
    y: i64,
}

pub async fn world2geo(Query(query): Query<World2GeoQuery>) -> Json<serde_json::Value> {
    let (region_x, region_y, cell_x, cell_y) = geo_codec::coords::world_to_region(query.x, query.y);
    Json(json!({
        "region_x": region_x,
        "region_y": region_y,
        "cell_x": cell_x,
        "cell_y": cell_y,
        "file": format!("{region_x}_{region_y}.l2d"),
    }))
}

