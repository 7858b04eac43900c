// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::chunker::chunk_devices;
use crate::device::DeviceUpdate;
use crate::error::SyncError;
use crate::gateway::session::GatewaySession;
use crate::gateway::transport::{
    AgentConfigRequest, AgentConfigResponse, AgentHelloRequest, AgentHelloResponse,
    GatewayStatusChunk, GatewayStatusRequest, GatewayTransport,
};
use crate::metrics::NoopMetrics;

#[derive(Default)]
struct MockTransport {
    hello_calls: AtomicU32,
    fail_hello: bool,
    heartbeat_hint: Option<u64>,
    config_poll_hint: Option<u64>,
    not_modified: bool,
}

#[async_trait]
impl GatewayTransport for MockTransport {
    async fn hello(&self, _req: AgentHelloRequest) -> Result<AgentHelloResponse, SyncError> {
        self.hello_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_hello {
            return Err(SyncError::transport("hello failed"));
        }
        Ok(AgentHelloResponse {
            tenant_id: "tenant-1".to_owned(),
            tenant_slug: "tenant-one".to_owned(),
            heartbeat_interval_sec: self.heartbeat_hint,
        })
    }

    async fn get_config(&self, req: AgentConfigRequest) -> Result<AgentConfigResponse, SyncError> {
        Ok(AgentConfigResponse {
            not_modified: self.not_modified,
            config_json: Some(serde_json::json!({"sources": {}})),
            config_version: if self.not_modified { req.config_version } else { "v2".to_owned() },
            config_poll_interval_sec: self.config_poll_hint,
            heartbeat_interval_sec: self.heartbeat_hint,
        })
    }

    async fn stream_status(&self, _chunks: Vec<GatewayStatusChunk>) -> Result<(), SyncError> {
        Ok(())
    }

    async fn push_status(&self, _req: GatewayStatusRequest) -> Result<(), SyncError> {
        Ok(())
    }
}

fn breaker() -> Arc<CircuitBreaker> {
    Arc::new(CircuitBreaker::new("gateway-test", BreakerConfig::default(), Arc::new(NoopMetrics)))
}

fn session_with(transport: MockTransport) -> GatewaySession {
    GatewaySession::new(Arc::new(transport), breaker(), Arc::new(NoopMetrics), "agent-1", "part-1")
}

#[tokio::test]
async fn pre_enrollment_calls_are_rejected() {
    let session = session_with(MockTransport::default());
    assert!(matches!(session.push_status().await, Err(SyncError::GatewayNotEnrolled)));
    assert!(matches!(
        session.stream_status(vec![]).await,
        Err(SyncError::GatewayNotEnrolled)
    ));
}

#[tokio::test]
async fn connect_and_enroll_fills_empty_identity_slots() -> anyhow::Result<()> {
    let session = session_with(MockTransport::default());
    session.connect_and_enroll(vec!["sync".to_owned()]).await?;

    assert!(session.is_connected());
    assert!(session.is_enrolled());
    let (tenant_id, tenant_slug) = session.tenant_identity().await;
    assert_eq!(tenant_id, "tenant-1");
    assert_eq!(tenant_slug, "tenant-one");
    Ok(())
}

#[tokio::test]
async fn failed_hello_leaves_session_disconnected() {
    let session = session_with(MockTransport { fail_hello: true, ..Default::default() });
    let err = session.connect_and_enroll(vec![]).await.unwrap_err();
    assert!(matches!(err, SyncError::GatewayTransport { .. }));
    assert!(!session.is_connected());
    assert!(!session.is_enrolled());
}

#[tokio::test]
async fn heartbeat_interval_hint_is_clamped() -> anyhow::Result<()> {
    let session = session_with(MockTransport { heartbeat_hint: Some(5), ..Default::default() });
    session.connect_and_enroll(vec![]).await?;
    assert_eq!(session.heartbeat_interval().await, Duration::from_secs(10));
    Ok(())
}

#[tokio::test]
async fn config_poll_interval_hint_is_clamped_high() -> anyhow::Result<()> {
    let session =
        session_with(MockTransport { config_poll_hint: Some(999_999), ..Default::default() });
    session.connect_and_enroll(vec![]).await?;
    let delivery = session.get_config().await?;
    assert!(delivery.is_some());
    assert_eq!(session.config_poll_interval().await, Duration::from_secs(24 * 3600));
    Ok(())
}

#[tokio::test]
async fn not_modified_config_returns_none_but_still_applies_hints() -> anyhow::Result<()> {
    let session = session_with(MockTransport {
        not_modified: true,
        heartbeat_hint: Some(45),
        ..Default::default()
    });
    session.connect_and_enroll(vec![]).await?;
    let delivery = session.get_config().await?;
    assert!(delivery.is_none());
    assert_eq!(session.heartbeat_interval().await, Duration::from_secs(45));
    Ok(())
}

#[tokio::test]
async fn stream_status_attaches_tenant_envelope_after_enrollment() -> anyhow::Result<()> {
    let session = session_with(MockTransport::default());
    session.connect_and_enroll(vec![]).await?;

    let devices = vec![DeviceUpdate {
        device_id: "d1".to_owned(),
        ip: "10.0.0.1".to_owned(),
        hostname: None,
        source: "armis".to_owned(),
        agent_id: "agent-1".to_owned(),
        poller_id: "poller".to_owned(),
        is_available: true,
        timestamp: 1,
        metadata: Default::default(),
    }];
    let chunks = chunk_devices("123", devices, crate::chunker::DEFAULT_MAX_CHUNK_SIZE);
    session.stream_status(chunks).await?;
    Ok(())
}
