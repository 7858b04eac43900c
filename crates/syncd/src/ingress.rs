// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ingress HTTP surface: the three RPC-equivalents the parent host invokes
//! (`status`, `config`, `results`), wire-shaped as a stable API rather than
//! an ad-hoc debug payload.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::ErrorResponse;
use crate::tenant::now_unix;
use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct StatusQuery {
    #[serde(default)]
    pub service_name: Option<String>,
}

/// The JSON-encoded payload carried in [`StatusResponse::message`].
#[derive(Debug, Serialize)]
struct StatusMessage {
    status: &'static str,
    sources: u64,
    devices: u64,
    last_discovery: i64,
    timestamp: i64,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub available: bool,
    pub agent_id: String,
    pub message: String,
    pub service_name: String,
    pub service_type: &'static str,
}

/// `GET /api/v1/status` — echoes the requested `service_name` and reports
/// current counts; there is no health-degraded flag, only the counts
/// themselves. Deeper observability lives in the metrics sink, not here.
pub async fn status(State(s): State<Arc<AppState>>, Query(query): Query<StatusQuery>) -> impl IntoResponse {
    let (devices, sources) = s.results.totals().await;
    let message = StatusMessage {
        status: "healthy",
        sources: sources as u64,
        devices: devices as u64,
        last_discovery: s.results.last_discovery_unix().await,
        timestamp: now_unix(),
    };
    let body = StatusResponse {
        available: true,
        agent_id: s.config.read().await.agent_id.clone(),
        message: serde_json::to_string(&message).unwrap_or_default(),
        service_name: query.service_name.unwrap_or_else(|| "sync".to_owned()),
        service_type: "sync",
    };
    Json(body)
}

/// `GET /api/v1/config` — the live config, JSON-serialized verbatim.
pub async fn config(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let snapshot = s.config.read().await.clone();
    Json(snapshot)
}

/// One chunk of a config push. `config`'s streaming variant always emits
/// exactly one chunk carrying the whole config, marked final.
#[derive(Debug, Serialize)]
pub struct ConfigStreamChunk {
    pub data: Config,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub is_final: bool,
}

/// `GET /api/v1/config/stream` — the same payload as `config`, framed as a
/// single final chunk so a caller using the chunked-push wire shape can
/// consume either RPC identically.
pub async fn config_stream(State(s): State<Arc<AppState>>) -> impl IntoResponse {
    let data = s.config.read().await.clone();
    Json(ConfigStreamChunk { data, chunk_index: 0, total_chunks: 1, is_final: true })
}

/// `GET /api/v1/results` — legacy surface; the canonical results path is the
/// gateway push, not a pull endpoint on this process.
pub async fn results() -> impl IntoResponse {
    let body = ErrorResponse {
        error: crate::error::ErrorBody {
            code: "NOT_IMPLEMENTED".to_owned(),
            message: "results is unimplemented; the canonical results path is the gateway push".to_owned(),
        },
    };
    (StatusCode::NOT_IMPLEMENTED, Json(body))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/config", get(config))
        .route("/api/v1/config/stream", get(config_stream))
        .route("/api/v1/results", get(results))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod tests;
