use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use std::sync::Arc;
use crate::cache;
use crate::error::DispatchError;
use crate::models::{LogicalRequest, Verb};
use crate::state::AppState;

// GET /api/{service}
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut req = LogicalRequest::new(Verb::Get, &service);
    if !bypasses_cache(&headers) {
        req = req.with_cache_key(cache::collection_key(&service));
    }
    forward(&state, req).await
}

// POST /api/{service}
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    Path(service): Path<String>,
    body: Bytes,
) -> Response {
    let mut req = LogicalRequest::new(Verb::Post, service);
    match parse_json_body(&body) {
        Ok(Some(value)) => req = req.with_body(value),
        Ok(None) => {}
        Err(rejection) => return rejection,
    }
    forward(&state, req).await
}

// GET /api/{service}/{id}
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path((service, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let mut req = LogicalRequest::new(Verb::Get, &service).with_id(&id);
    if !bypasses_cache(&headers) {
        req = req.with_cache_key(cache::item_key(&service, &id));
    }
    forward(&state, req).await
}

// PUT /api/{service}/{id}
pub async fn update_handler(
    State(state): State<Arc<AppState>>,
    Path((service, id)): Path<(String, String)>,
    body: Bytes,
) -> Response {
    let mut req = LogicalRequest::new(Verb::Put, service).with_id(id);
    match parse_json_body(&body) {
        Ok(Some(value)) => req = req.with_body(value),
        Ok(None) => {}
        Err(rejection) => return rejection,
    }
    forward(&state, req).await
}

// DELETE /api/{service}/{id}
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path((service, id)): Path<(String, String)>,
) -> Response {
    let req = LogicalRequest::new(Verb::Delete, service).with_id(id);
    forward(&state, req).await
}

async fn forward(state: &AppState, req: LogicalRequest) -> Response {
    if !state.dispatcher.knows(&req.service) {
        return DispatchError::UnknownService(req.service).into_response();
    }
    if req.resource_id.as_deref().is_some_and(is_dot_segment) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid resource id" })),
        )
            .into_response();
    }

    match state.dispatcher.dispatch(&req).await {
        Ok(res) => {
            let status = StatusCode::from_u16(res.status).unwrap_or(StatusCode::OK);
            let mut response = match res.body {
                Some(body) if !status_forbids_body(status) => (status, Json(body)).into_response(),
                _ => status.into_response(),
            };
            if req.cache_key.is_some() {
                let marker = if res.from_cache { "HIT" } else { "MISS" };
                response
                    .headers_mut()
                    .insert("x-cache", HeaderValue::from_static(marker));
            }
            response
        }
        Err(e) => e.into_response(),
    }
}

// "." and ".." would be dropped or resolved as path segments, never forward them as ids
fn is_dot_segment(id: &str) -> bool {
    matches!(id, "" | "." | "..")
}

fn status_forbids_body(status: StatusCode) -> bool {
    status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
}

// Cache-Control: no-cache on a read skips the cache entirely
fn bypasses_cache(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.split(',').any(|d| d.trim().eq_ignore_ascii_case("no-cache")))
}

fn parse_json_body(body: &Bytes) -> Result<Option<Value>, Response> {
    if body.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(body).map(Some).map_err(|e| {
        tracing::debug!(error = %e, "rejecting unparsable body");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid JSON body" })),
        )
            .into_response()
    })
}
