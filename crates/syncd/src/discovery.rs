// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Discovery orchestrator: one cycle is
//! `Adapter::fetch → Blacklist::filter → ResultsStore update → chunk → GatewaySession::stream_status`,
//! failure-isolated per source and joined into a single error for the cycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::adapter::Adapter;
use crate::blacklist::NetworkBlacklist;
use crate::chunker::{chunk_devices, DEFAULT_MAX_CHUNK_SIZE};
use crate::config::Config;
use crate::device::DeviceUpdate;
use crate::error::{JoinedError, SyncError};
use crate::gateway::GatewaySession;
use crate::metrics::MetricsSink;
use crate::tenant::{now_unix, partition_by_tenant, ResultsStore};

/// One installed source: its adapter instance and precompiled blacklist.
pub struct Integration {
    pub adapter: Arc<dyn Adapter>,
    pub blacklist: NetworkBlacklist,
}

/// Live, swappable integration table. The config reloader replaces this
/// wholesale under the write lock; readers (orchestrator ticks) take the
/// read side and never hold it across an adapter call.
pub type IntegrationTable = RwLock<HashMap<String, Integration>>;

pub struct DiscoveryOrchestrator {
    config: Arc<RwLock<Config>>,
    integrations: Arc<IntegrationTable>,
    results: Arc<ResultsStore>,
    metrics: Arc<dyn MetricsSink>,
    gateway: Option<Arc<GatewaySession>>,
    max_chunk_size: usize,
}

impl DiscoveryOrchestrator {
    pub fn new(
        config: Arc<RwLock<Config>>,
        integrations: Arc<IntegrationTable>,
        results: Arc<ResultsStore>,
        metrics: Arc<dyn MetricsSink>,
        gateway: Option<Arc<GatewaySession>>,
    ) -> Self {
        Self { config, integrations, results, metrics, gateway, max_chunk_size: DEFAULT_MAX_CHUNK_SIZE }
    }

    /// Runs one discovery cycle across every installed source, aggregates by
    /// tenant, and (if a gateway is configured and enrolled) streams the
    /// result. Returns the joined per-source failures, if any; a push
    /// failure to the gateway is recorded but never aborts the cycle.
    pub async fn run_once(&self) -> Result<(), JoinedError> {
        let config_snapshot = self.config.read().await.clone();
        let tenant_buckets = partition_by_tenant(&config_snapshot);

        let mut joined = JoinedError::default();
        self.metrics.set_active_integrations(self.integrations.read().await.len() as u64);

        for (tenant_id, bucket) in tenant_buckets {
            let mut tenant_devices: Vec<DeviceUpdate> = Vec::new();
            let mut live_source_count = 0usize;

            for source in &bucket.sources {
                let integrations = self.integrations.read().await;
                let Some(integration) = integrations.get(&source.name) else {
                    continue;
                };
                let adapter = integration.adapter.clone();
                let blacklist = integration.blacklist.clone();
                drop(integrations);

                live_source_count += 1;
                self.metrics.discovery_attempt(&source.name);
                let started = Instant::now();

                match adapter.fetch().await {
                    Ok(devices) => {
                        let filtered = blacklist.filter_devices(devices);
                        let elapsed = started.elapsed();
                        self.metrics.discovery_success(&source.name, filtered.len(), elapsed.as_millis() as u64);
                        tenant_devices.extend(filtered);
                    }
                    Err(err) => {
                        let elapsed = started.elapsed();
                        self.metrics.discovery_failure(&source.name, elapsed.as_millis() as u64);
                        tracing::warn!(source = %source.name, error = %err, "discovery fetch failed");
                        joined.push(SyncError::fetch_failed(source.name.clone(), elapsed, err.to_string()));
                    }
                }
            }

            let device_count = tenant_devices.len();
            if device_count > 0 {
                self.results.record(&tenant_id, device_count, live_source_count).await;
            }
            self.metrics.add_devices_discovered(device_count as u64);

            if let Some(gateway) = &self.gateway {
                if !gateway.is_enrolled() {
                    tracing::debug!(tenant = %tenant_id, "gateway not enrolled, skipping stream_status");
                    continue;
                }
                let sequence = now_unix().to_string();
                let chunks = chunk_devices(&sequence, tenant_devices, self.max_chunk_size);
                if let Err(err) = gateway.stream_status(chunks).await {
                    tracing::warn!(tenant = %tenant_id, error = %err, "stream_status push failed");
                }
            }
        }

        joined.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::StaticAdapter;
    use crate::config::{SecurityConfig, SourceConfig, TenantScope};
    use crate::metrics::NoopMetrics;
    use std::collections::HashMap as Map;

    fn device(id: &str, ip: &str) -> DeviceUpdate {
        DeviceUpdate {
            device_id: id.to_owned(),
            ip: ip.to_owned(),
            hostname: None,
            source: "static".to_owned(),
            agent_id: "agent".to_owned(),
            poller_id: "poller".to_owned(),
            is_available: true,
            timestamp: 1,
            metadata: Default::default(),
        }
    }

    fn source(name: &str, tenant_id: &str, blacklist: Vec<String>) -> SourceConfig {
        SourceConfig {
            name: name.to_owned(),
            source_type: "static".to_owned(),
            endpoint: "static://".to_owned(),
            credentials: Map::new(),
            prefix: String::new(),
            tenant_id: Some(tenant_id.to_owned()),
            tenant_slug: Some(format!("{tenant_id}-slug")),
            partition: String::new(),
            agent_id: String::new(),
            gateway_id: String::new(),
            network_blacklist: blacklist,
            discovery_interval: None,
            poll_interval: None,
            sweep_interval: None,
        }
    }

    fn config_with(sources: Vec<SourceConfig>) -> Config {
        Config {
            sources: sources.into_iter().map(|s| (s.name.clone(), s)).collect(),
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

    #[tokio::test]
    async fn fetches_filters_and_records_per_tenant() -> anyhow::Result<()> {
        let src = source("armis", "t1", vec!["10.0.0.0/8".to_owned()]);
        let config = Arc::new(RwLock::new(config_with(vec![src.clone()])));

        let adapter = Arc::new(StaticAdapter::new(
            "armis",
            vec![device("d1", "10.1.1.1"), device("d2", "8.8.8.8")],
        ));
        let blacklist = NetworkBlacklist::new(&src.network_blacklist)?;
        let mut table = HashMap::new();
        table.insert("armis".to_owned(), Integration { adapter, blacklist });
        let integrations = Arc::new(RwLock::new(table));

        let results = Arc::new(ResultsStore::new());
        let orchestrator = DiscoveryOrchestrator::new(
            config,
            integrations,
            results.clone(),
            Arc::new(NoopMetrics),
            None,
        );

        orchestrator.run_once().await.map_err(|e| anyhow::anyhow!(e.to_string()))?;

        let snapshot = results.get("t1").await.unwrap();
        assert_eq!(snapshot.device_count, 1);
        assert_eq!(snapshot.source_count, 1);
        Ok(())
    }

    #[tokio::test]
    async fn missing_integration_for_a_configured_source_is_skipped_not_fatal() -> anyhow::Result<()> {
        let src = source("ghost", "t1", vec![]);
        let config = Arc::new(RwLock::new(config_with(vec![src])));
        let integrations = Arc::new(RwLock::new(HashMap::new()));
        let results = Arc::new(ResultsStore::new());

        let orchestrator =
            DiscoveryOrchestrator::new(config, integrations, results.clone(), Arc::new(NoopMetrics), None);
        orchestrator.run_once().await.map_err(|e| anyhow::anyhow!(e.to_string()))?;

        assert!(results.get("t1").await.is_none());
        Ok(())
    }
}
