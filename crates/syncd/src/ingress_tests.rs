// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;
use std::sync::Arc;

use axum_test::TestServer;
use tokio::sync::RwLock;

use crate::config::{Config, SecurityConfig, TenantScope};
use crate::discovery::IntegrationTable;
use crate::metrics::NoopMetrics;
use crate::tenant::ResultsStore;
use crate::AppState;

fn blank_config() -> Config {
    Config {
        sources: HashMap::new(),
        discovery_interval: "6h".to_owned(),
        update_interval: "12h".to_owned(),
        poll_interval: "30s".to_owned(),
        config_poll_interval: "5m".to_owned(),
        heartbeat_interval: "30s".to_owned(),
        listen_addr: "127.0.0.1:9000".to_owned(),
        agent_id: "agent".to_owned(),
        gateway_id: String::new(),
        partition: String::new(),
        tenant_id: "default".to_owned(),
        tenant_slug: "default".to_owned(),
        tenant_scope: TenantScope::Tenant,
        gateway_addr: None,
        security: SecurityConfig::default(),
    }
}

fn test_state() -> Arc<AppState> {
    Arc::new(AppState {
        config: Arc::new(RwLock::new(blank_config())),
        integrations: Arc::new(RwLock::new(HashMap::new())) as Arc<IntegrationTable>,
        results: Arc::new(ResultsStore::new()),
        metrics: Arc::new(NoopMetrics),
        gateway: None,
        shutdown: tokio_util::sync::CancellationToken::new(),
    })
}

#[tokio::test]
async fn status_echoes_service_name_and_reports_zero_counts_with_no_discovery_yet() -> anyhow::Result<()> {
    let server = TestServer::new(super::router(test_state()))?;
    let response = server.get("/api/v1/status?service_name=sync").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["available"], true);
    assert_eq!(body["agent_id"], "agent");
    assert_eq!(body["service_name"], "sync");
    assert_eq!(body["service_type"], "sync");

    let message: serde_json::Value = serde_json::from_str(body["message"].as_str().unwrap())?;
    assert_eq!(message["status"], "healthy");
    assert_eq!(message["sources"], 0);
    assert_eq!(message["devices"], 0);
    Ok(())
}

#[tokio::test]
async fn status_defaults_service_name_when_omitted() -> anyhow::Result<()> {
    let server = TestServer::new(super::router(test_state()))?;
    let response = server.get("/api/v1/status").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["service_name"], "sync");
    Ok(())
}

#[tokio::test]
async fn status_reports_counts_recorded_by_a_discovery_cycle() -> anyhow::Result<()> {
    let state = test_state();
    state.results.record("t1", 3, 1).await;
    let server = TestServer::new(super::router(state))?;
    let response = server.get("/api/v1/status").await;
    let body: serde_json::Value = response.json();
    let message: serde_json::Value = serde_json::from_str(body["message"].as_str().unwrap())?;
    assert_eq!(message["devices"], 3);
    assert_eq!(message["sources"], 1);
    Ok(())
}

#[tokio::test]
async fn config_endpoint_returns_current_snapshot() -> anyhow::Result<()> {
    let server = TestServer::new(super::router(test_state()))?;
    let response = server.get("/api/v1/config").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["listen_addr"], "127.0.0.1:9000");
    Ok(())
}

#[tokio::test]
async fn config_stream_emits_a_single_final_chunk_with_the_same_payload() -> anyhow::Result<()> {
    let server = TestServer::new(super::router(test_state()))?;
    let response = server.get("/api/v1/config/stream").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["is_final"], true);
    assert_eq!(body["chunk_index"], 0);
    assert_eq!(body["total_chunks"], 1);
    assert_eq!(body["data"]["listen_addr"], "127.0.0.1:9000");
    Ok(())
}

#[tokio::test]
async fn results_endpoint_is_not_implemented() -> anyhow::Result<()> {
    let server = TestServer::new(super::router(test_state()))?;
    let response = server.get("/api/v1/results").await;
    response.assert_status(axum::http::StatusCode::NOT_IMPLEMENTED);
    Ok(())
}
