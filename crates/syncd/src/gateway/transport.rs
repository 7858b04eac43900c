// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire-level gateway RPCs, kept transport-agnostic behind [`GatewayTransport`]
//! so the session state machine never touches `reqwest` directly.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::chunker::ResultsChunk;
use crate::error::SyncError;

#[derive(Debug, Clone, Serialize)]
pub struct AgentHelloRequest {
    pub agent_id: String,
    pub version: String,
    pub capabilities: Vec<String>,
    pub partition: String,
    pub config_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentHelloResponse {
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub tenant_slug: String,
    #[serde(default)]
    pub heartbeat_interval_sec: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentConfigRequest {
    pub agent_id: String,
    pub config_version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfigResponse {
    #[serde(default)]
    pub not_modified: bool,
    #[serde(default)]
    pub config_json: Option<serde_json::Value>,
    #[serde(default)]
    pub config_version: String,
    #[serde(default)]
    pub config_poll_interval_sec: Option<u64>,
    #[serde(default)]
    pub heartbeat_interval_sec: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayServiceStatus {
    pub service_name: String,
    pub available: bool,
    pub message: Vec<u8>,
    pub service_type: String,
    pub source: String,
    pub agent_id: String,
    pub partition: String,
    pub tenant_id: String,
    pub tenant_slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatusChunk {
    pub services: Vec<GatewayServiceStatus>,
    pub agent_id: String,
    pub timestamp: i64,
    pub partition: String,
    pub is_final: bool,
    pub chunk_index: u32,
    pub total_chunks: u32,
    pub tenant_id: String,
    pub tenant_slug: String,
}

impl GatewayStatusChunk {
    /// Wraps one [`ResultsChunk`] in the gateway's status envelope.
    pub fn from_results_chunk(
        chunk: &ResultsChunk,
        agent_id: &str,
        partition: &str,
        tenant_id: &str,
        tenant_slug: &str,
        timestamp: i64,
    ) -> Self {
        let message = serde_json::to_vec(&chunk.devices).unwrap_or_default();
        GatewayStatusChunk {
            services: vec![GatewayServiceStatus {
                service_name: "sync".to_owned(),
                available: true,
                message,
                service_type: "sync".to_owned(),
                source: "results".to_owned(),
                agent_id: agent_id.to_owned(),
                partition: partition.to_owned(),
                tenant_id: tenant_id.to_owned(),
                tenant_slug: tenant_slug.to_owned(),
            }],
            agent_id: agent_id.to_owned(),
            timestamp,
            partition: partition.to_owned(),
            is_final: chunk.is_final,
            chunk_index: chunk.chunk_index,
            total_chunks: chunk.total_chunks,
            tenant_id: tenant_id.to_owned(),
            tenant_slug: tenant_slug.to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatusRequest {
    pub agent_id: String,
    pub partition: String,
    pub tenant_id: String,
    pub tenant_slug: String,
    pub timestamp: i64,
}

/// Wire-level gateway RPCs. Implementations own their own per-call timeouts;
/// callers (the session) wrap each call in a circuit breaker.
#[async_trait]
pub trait GatewayTransport: Send + Sync {
    async fn hello(&self, req: AgentHelloRequest) -> Result<AgentHelloResponse, SyncError>;
    async fn get_config(&self, req: AgentConfigRequest) -> Result<AgentConfigResponse, SyncError>;
    async fn stream_status(&self, chunks: Vec<GatewayStatusChunk>) -> Result<(), SyncError>;
    async fn push_status(&self, req: GatewayStatusRequest) -> Result<(), SyncError>;
}

/// HTTP implementation of [`GatewayTransport`], one instance per gateway
/// address. Each RPC carries its own per-call timeout.
pub struct HttpGatewayTransport {
    base_url: String,
    client: Client,
}

impl HttpGatewayTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { base_url: base_url.into(), client: Client::new() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl GatewayTransport for HttpGatewayTransport {
    async fn hello(&self, req: AgentHelloRequest) -> Result<AgentHelloResponse, SyncError> {
        let resp = self
            .client
            .post(self.url("/api/v1/agent/hello"))
            .json(&req)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| SyncError::transport(e.to_string()))?;
        resp.error_for_status()
            .map_err(|e| SyncError::transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| SyncError::transport(e.to_string()))
    }

    async fn get_config(&self, req: AgentConfigRequest) -> Result<AgentConfigResponse, SyncError> {
        let resp = self
            .client
            .post(self.url("/api/v1/agent/config"))
            .json(&req)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| SyncError::transport(e.to_string()))?;
        resp.error_for_status()
            .map_err(|e| SyncError::transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| SyncError::transport(e.to_string()))
    }

    async fn stream_status(&self, chunks: Vec<GatewayStatusChunk>) -> Result<(), SyncError> {
        self.client
            .post(self.url("/api/v1/agent/status/stream"))
            .json(&chunks)
            .timeout(Duration::from_secs(30))
            .send()
            .await
            .map_err(|e| SyncError::transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| SyncError::transport(e.to_string()))?;
        Ok(())
    }

    async fn push_status(&self, req: GatewayStatusRequest) -> Result<(), SyncError> {
        self.client
            .post(self.url("/api/v1/agent/status"))
            .json(&req)
            .timeout(Duration::from_secs(10))
            .send()
            .await
            .map_err(|e| SyncError::transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| SyncError::transport(e.to_string()))?;
        Ok(())
    }
}
