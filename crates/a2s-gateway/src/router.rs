//! HTTP routes for the public and admin listeners.
//!
//! Handlers stay thin: they extract, call into the bridge, receiver or
//! registry, and map the result. All error mapping goes through
//! [`ApiError`].

use crate::adapters::pending::{CorrelationTable, DeliverySource};
use crate::bridge::{BridgeOutcome, CallbackBridge};
use crate::domain::config::GatewayConfig;
use crate::domain::error::{kinds, ApiError, ApiResult, RegistryError};
use crate::domain::target::{LegacyTargetRecord, NewTarget, TargetRecord};
use crate::middleware::{create_cors_layer, BridgeMetrics, TracingLayer};
use crate::ports::TargetRegistry;
use crate::receiver::CallbackReceiver;
use axum::{
    extract::{ConnectInfo, DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub bridge: Arc<CallbackBridge>,
    pub receiver: Arc<CallbackReceiver>,
    pub registry: Arc<dyn TargetRegistry>,
    pub table: Arc<CorrelationTable>,
    pub metrics: Arc<BridgeMetrics>,
}

/// Public listener routes, with the middleware stack applied
pub fn public_router(state: AppState, config: &GatewayConfig) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TracingLayer::new())
        .layer(create_cors_layer(&config.cors));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/bridge/pending", get(list_pending))
        .route("/bridge/callback/:callback_id", post(receive_callback))
        .route("/bridge/:request_id", post(bridge_request))
        .route("/targets", post(create_target).get(list_targets))
        .route("/targets/:request_id", get(get_target).delete(delete_target))
        // Paths used by existing A2S clients
        .route("/a2s/request/:request_id", post(bridge_request))
        .route("/a2s/callback/:callback_id", post(receive_callback))
        .route("/a2s/create", post(legacy_create_target))
        .route("/a2s/list", get(legacy_list_targets))
        .route("/a2s/delete", get(legacy_delete_target))
        .route("/a2s/delete/", get(legacy_delete_target))
        .layer(DefaultBodyLimit::max(config.limits.max_request_size))
        .layer(middleware)
        .with_state(state)
}

/// Admin listener routes
pub fn admin_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(admin_metrics))
        .route("/pending", get(admin_pending))
        .with_state(state)
}

/// Liveness banner
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": Uuid::new_v4() }))
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "a2s-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Bridge a request to its target and hold the connection until the
/// callback arrives.
async fn bridge_request(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    match state.bridge.bridge(&request_id, body).await? {
        BridgeOutcome::Echo(body) => Ok(raw_response(&headers, body)),
        BridgeOutcome::Fulfilled { payload, .. } => Ok(Json(payload).into_response()),
    }
}

/// Webhook endpoint the target calls when it is done.
async fn receive_callback(
    State(state): State<AppState>,
    Path(callback_id): Path<String>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let source = DeliverySource::new(connect_info.map(|ConnectInfo(addr)| addr), user_agent);

    let ack = state.receiver.on_callback(&callback_id, body, source)?;
    Ok(raw_response(&headers, ack))
}

/// Answer with `body` as-is, labelled with the request's content type.
fn raw_response(request_headers: &HeaderMap, body: Bytes) -> Response {
    let content_type = request_headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/json"));
    ([(header::CONTENT_TYPE, content_type)], body).into_response()
}

async fn list_pending(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ids = state.table.list_pending();
    Json(serde_json::json!({
        "count": ids.len(),
        "callbackIds": ids,
    }))
}

/// Register a target. An empty body registers an echo target with a
/// generated id and the default deadline.
fn register_target(state: &AppState, body: &[u8]) -> ApiResult<TargetRecord> {
    let new: NewTarget = if body.iter().all(u8::is_ascii_whitespace) {
        NewTarget::default()
    } else {
        serde_json::from_slice(body)
            .map_err(|e| ApiError::new(422, kinds::INVALID_TARGET, e.to_string()))?
    };

    let record = TargetRecord::from_registration(new, state.bridge.config())?;
    Ok(state.registry.insert(record)?)
}

async fn create_target(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<TargetRecord>> {
    register_target(&state, &body).map(Json)
}

async fn list_targets(State(state): State<AppState>) -> Json<Vec<TargetRecord>> {
    Json(state.registry.list())
}

async fn legacy_create_target(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<LegacyTargetRecord>> {
    register_target(&state, &body).map(|record| Json(record.into()))
}

async fn legacy_list_targets(State(state): State<AppState>) -> Json<Vec<LegacyTargetRecord>> {
    Json(state.registry.list().into_iter().map(Into::into).collect())
}

async fn get_target(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> ApiResult<Json<TargetRecord>> {
    let record = state
        .registry
        .get(&request_id)
        .ok_or(RegistryError::NotFound(request_id))?;
    Ok(Json(record))
}

/// Delete a target. Succeeds whether or not it existed.
async fn delete_target(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Json<serde_json::Value> {
    state.registry.remove(&request_id);
    Json(serde_json::json!({ "success": true }))
}

#[derive(Debug, Deserialize)]
struct LegacyDeleteQuery {
    req_id: String,
}

async fn legacy_delete_target(
    state: State<AppState>,
    Query(query): Query<LegacyDeleteQuery>,
) -> Json<serde_json::Value> {
    delete_target(state, Path(query.req_id)).await
}

async fn admin_metrics(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(state.metrics.to_json())
}

async fn admin_pending(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ids = state.table.list_pending();
    Json(serde_json::json!({
        "count": ids.len(),
        "callbackIds": ids,
        "stats": state.table.stats_json(),
    }))
}
