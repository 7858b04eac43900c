// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway session state machine: Disconnected → Connected → Enrolled.
//!
//! `connected`/`enrolled` are atomic flags so cheap reads (e.g. the ingress
//! status endpoint) never contend with the mutex guarding tenant identity and
//! interval state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::breaker::CircuitBreaker;
use crate::chunker::ResultsChunk;
use crate::error::SyncError;
use crate::gateway::transport::{
    AgentConfigRequest, AgentConfigResponse, AgentHelloRequest, GatewayStatusChunk,
    GatewayStatusRequest, GatewayTransport,
};
use crate::metrics::MetricsSink;
use crate::tenant::now_unix;

const HEARTBEAT_MIN: Duration = Duration::from_secs(10);
const HEARTBEAT_MAX: Duration = Duration::from_secs(10 * 60);
const CONFIG_POLL_MIN: Duration = Duration::from_secs(30);
const CONFIG_POLL_MAX: Duration = Duration::from_secs(24 * 3600);

fn clamp(value: Duration, min: Duration, max: Duration) -> Duration {
    value.clamp(min, max)
}

#[derive(Debug, Clone, Default)]
struct Identity {
    tenant_id: String,
    tenant_slug: String,
    config_version: String,
}

struct Intervals {
    config_poll: Duration,
    heartbeat: Duration,
}

impl Default for Intervals {
    fn default() -> Self {
        Self { config_poll: Duration::from_secs(5 * 60), heartbeat: Duration::from_secs(30) }
    }
}

/// Outcome of a successful `get_config` call that produced a fresh version.
pub struct ConfigDelivery {
    pub config_version: String,
    pub config_json: serde_json::Value,
}

/// One connection to the upstream gateway, carrying its own circuit breaker.
/// A session is either owned (this process's only client for this gateway)
/// or shared; shared sessions return `GatewayNotEnrolled` to callers that
/// lose the race to enroll rather than fail loudly. The transport is boxed
/// as a trait object so `Lifecycle` can hold one session type regardless of
/// which `GatewayTransport` impl backs it (HTTP in production, a mock in tests).
pub struct GatewaySession {
    transport: Arc<dyn GatewayTransport>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<dyn MetricsSink>,
    connected: AtomicBool,
    enrolled: AtomicBool,
    identity: Mutex<Identity>,
    intervals: Mutex<Intervals>,
    agent_id: String,
    partition: String,
}

impl GatewaySession {
    pub fn new(
        transport: Arc<dyn GatewayTransport>,
        breaker: Arc<CircuitBreaker>,
        metrics: Arc<dyn MetricsSink>,
        agent_id: impl Into<String>,
        partition: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            breaker,
            metrics,
            connected: AtomicBool::new(false),
            enrolled: AtomicBool::new(false),
            identity: Mutex::new(Identity::default()),
            intervals: Mutex::new(Intervals::default()),
            agent_id: agent_id.into(),
            partition: partition.into(),
        }
    }

    /// Records `api_{call,success,failure}` for one gateway RPC.
    fn record_api<T>(&self, endpoint: &'static str, result: &Result<T, SyncError>) {
        self.metrics.api_call(endpoint);
        match result {
            Ok(_) => self.metrics.api_success(endpoint),
            Err(_) => self.metrics.api_failure(endpoint),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_enrolled(&self) -> bool {
        self.enrolled.load(Ordering::Acquire)
    }

    pub async fn heartbeat_interval(&self) -> Duration {
        self.intervals.lock().await.heartbeat
    }

    pub async fn config_poll_interval(&self) -> Duration {
        self.intervals.lock().await.config_poll
    }

    pub async fn tenant_identity(&self) -> (String, String) {
        let identity = self.identity.lock().await;
        (identity.tenant_id.clone(), identity.tenant_slug.clone())
    }

    /// Connect → enroll. On success, fills tenant identity slots only if
    /// currently empty (monotonic identity) and adopts any clamped
    /// heartbeat hint.
    pub async fn connect_and_enroll(&self, capabilities: Vec<String>) -> Result<(), SyncError> {
        self.connected.store(true, Ordering::Release);
        let config_version = self.identity.lock().await.config_version.clone();

        let request = AgentHelloRequest {
            agent_id: self.agent_id.clone(),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            capabilities,
            partition: self.partition.clone(),
            config_version,
        };

        let transport = &self.transport;
        let response = self
            .breaker
            .execute(|| transport.hello(request.clone()))
            .await;
        self.record_api("hello", &response);

        match response {
            Ok(hello) => {
                let mut identity = self.identity.lock().await;
                if identity.tenant_id.is_empty() {
                    identity.tenant_id = hello.tenant_id;
                }
                if identity.tenant_slug.is_empty() {
                    identity.tenant_slug = hello.tenant_slug;
                }
                drop(identity);

                if let Some(secs) = hello.heartbeat_interval_sec {
                    let mut intervals = self.intervals.lock().await;
                    intervals.heartbeat = clamp(Duration::from_secs(secs), HEARTBEAT_MIN, HEARTBEAT_MAX);
                }

                self.enrolled.store(true, Ordering::Release);
                Ok(())
            }
            Err(err) => {
                self.connected.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    fn require_enrolled(&self) -> Result<(), SyncError> {
        if self.is_enrolled() {
            Ok(())
        } else {
            Err(SyncError::GatewayNotEnrolled)
        }
    }

    /// Fetches config if the gateway reports a new version. Returns `None`
    /// on `not_modified`; still applies any clamped interval hints either way.
    pub async fn get_config(&self) -> Result<Option<ConfigDelivery>, SyncError> {
        self.require_enrolled()?;

        let config_version = self.identity.lock().await.config_version.clone();
        let request = AgentConfigRequest { agent_id: self.agent_id.clone(), config_version };

        let transport = &self.transport;
        let result: Result<AgentConfigResponse, SyncError> =
            self.breaker.execute(|| transport.get_config(request.clone())).await;
        self.record_api("get_config", &result);

        let response = match result {
            Ok(r) => r,
            Err(err) => {
                self.mark_disconnected_on_transport_error(&err);
                return Err(err);
            }
        };

        if let Some(secs) = response.config_poll_interval_sec {
            let mut intervals = self.intervals.lock().await;
            intervals.config_poll = clamp(Duration::from_secs(secs), CONFIG_POLL_MIN, CONFIG_POLL_MAX);
        }
        if let Some(secs) = response.heartbeat_interval_sec {
            let mut intervals = self.intervals.lock().await;
            intervals.heartbeat = clamp(Duration::from_secs(secs), HEARTBEAT_MIN, HEARTBEAT_MAX);
        }

        if response.not_modified {
            return Ok(None);
        }

        let config_json = response.config_json.unwrap_or(serde_json::Value::Null);
        self.identity.lock().await.config_version = response.config_version.clone();

        Ok(Some(ConfigDelivery { config_version: response.config_version, config_json }))
    }

    /// Attaches tenant/agent/partition envelope to each chunk and streams
    /// them. Pre-condition: Enrolled.
    pub async fn stream_status(&self, chunks: Vec<ResultsChunk>) -> Result<(), SyncError> {
        self.require_enrolled()?;

        let (tenant_id, tenant_slug) = self.tenant_identity().await;
        let timestamp = now_unix();
        let envelopes: Vec<GatewayStatusChunk> = chunks
            .iter()
            .map(|chunk| {
                GatewayStatusChunk::from_results_chunk(
                    chunk,
                    &self.agent_id,
                    &self.partition,
                    &tenant_id,
                    &tenant_slug,
                    timestamp,
                )
            })
            .collect();

        let transport = &self.transport;
        let result = self.breaker.execute(|| transport.stream_status(envelopes.clone())).await;
        self.record_api("stream_status", &result);
        if let Err(err) = &result {
            self.mark_disconnected_on_transport_error(err);
        }
        result
    }

    /// Heartbeat push with no body. Pre-condition: Enrolled.
    pub async fn push_status(&self) -> Result<(), SyncError> {
        self.require_enrolled()?;

        let (tenant_id, tenant_slug) = self.tenant_identity().await;
        let request = GatewayStatusRequest {
            agent_id: self.agent_id.clone(),
            partition: self.partition.clone(),
            tenant_id,
            tenant_slug,
            timestamp: now_unix(),
        };

        let transport = &self.transport;
        let result = self.breaker.execute(|| transport.push_status(request.clone())).await;
        self.record_api("push_status", &result);
        if let Err(err) = &result {
            self.mark_disconnected_on_transport_error(err);
        }
        result
    }

    /// Transport errors fall back to Disconnected so the next call's connect
    /// attempt re-establishes the session; a refused-by-breaker error is not
    /// itself a transport failure and does not flip connectivity.
    fn mark_disconnected_on_transport_error(&self, err: &SyncError) {
        if matches!(err, SyncError::GatewayTransport { .. }) {
            self.connected.store(false, Ordering::Release);
            self.enrolled.store(false, Ordering::Release);
        }
    }

    pub async fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        self.enrolled.store(false, Ordering::Release);
    }
}
