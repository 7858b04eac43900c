// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Syncd: a discovery-and-push sync engine. Pulls device inventories from
//! one or more external source systems, normalizes and blacklist-filters
//! them, and pushes the result (plus a heartbeat) to an upstream gateway
//! that aggregates multiple tenants. Runs a separate, non-overlapping
//! reconciliation loop that asks each source to push back availability.

pub mod adapter;
pub mod blacklist;
pub mod bootstrap;
pub mod breaker;
pub mod chunker;
pub mod config;
pub mod device;
pub mod discovery;
pub mod error;
pub mod gateway;
pub mod ingress;
pub mod lifecycle;
pub mod metrics;
pub mod reconcile;
pub mod reload;
pub mod tenant;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::adapter::AdapterRegistry;
use crate::bootstrap::BootstrapArgs;
use crate::config::Config;
use crate::discovery::{DiscoveryOrchestrator, IntegrationTable};
use crate::gateway::{GatewaySession, HttpGatewayTransport};
use crate::lifecycle::Service;
use crate::metrics::{InMemoryMetrics, MetricsSink};
use crate::reconcile::ReconcileOrchestrator;
use crate::reload::ConfigReloader;
use crate::tenant::ResultsStore;

/// Shared, read-mostly state backing the ingress surface. Distinct from
/// `Service`, which owns the loops: `AppState` only ever reads.
pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    pub integrations: Arc<IntegrationTable>,
    pub results: Arc<ResultsStore>,
    pub metrics: Arc<dyn MetricsSink>,
    pub gateway: Option<Arc<GatewaySession>>,
    pub shutdown: CancellationToken,
}

fn load_config(args: &BootstrapArgs) -> anyhow::Result<Config> {
    let Some(path) = &args.config_file else {
        anyhow::bail!("--config-file (or SYNCD_CONFIG) is required");
    };
    let contents = std::fs::read_to_string(path)?;
    let mut config: Config = serde_json::from_str(&contents)?;

    if let Some(gateway_addr) = &args.gateway_addr {
        config.gateway_addr = Some(gateway_addr.clone());
    }
    if let Some(agent_id) = &args.agent_id {
        config.agent_id = agent_id.clone();
    }
    config.listen_addr = args.listen_addr.clone();

    Ok(config)
}

/// Boots the process: loads config, builds the integration table, optionally
/// connects to a gateway, starts the lifecycle loops, and serves the
/// ingress HTTP surface until shutdown.
pub async fn run(args: BootstrapArgs) -> anyhow::Result<()> {
    // reqwest is built against rustls-no-provider; a process-wide crypto
    // provider must be installed before the gateway client makes its first
    // call. Idempotent if something else already installed one.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let config = load_config(&args)?;
    config.validate()?;
    let listen_addr = config.listen_addr.clone();

    let registry = Arc::new(AdapterRegistry::with_builtins());
    let metrics: Arc<dyn MetricsSink> = Arc::new(InMemoryMetrics::new());

    let mut integration_table = HashMap::new();
    for source in config.sources.values() {
        let Some(build_result) = registry.build(source) else {
            tracing::warn!(source = %source.name, source_type = %source.source_type, "unknown adapter type, skipping");
            continue;
        };
        match build_result {
            Ok(adapter) => {
                let blacklist = crate::blacklist::NetworkBlacklist::new(&source.network_blacklist)?;
                integration_table.insert(source.name.clone(), discovery::Integration { adapter, blacklist });
            }
            Err(err) => {
                tracing::warn!(source = %source.name, error = %err, "adapter construction failed, skipping");
            }
        }
    }

    let config = Arc::new(RwLock::new(config));
    let integrations: Arc<IntegrationTable> = Arc::new(RwLock::new(integration_table));
    let results = Arc::new(ResultsStore::new());

    let gateway_addr = config.read().await.gateway_addr.clone();
    let agent_id = config.read().await.agent_id.clone();
    let partition = config.read().await.partition.clone();

    let gateway = gateway_addr.map(|addr| {
        let transport = Arc::new(HttpGatewayTransport::new(addr));
        let breaker = Arc::new(crate::breaker::CircuitBreaker::new(
            "gateway",
            crate::breaker::BreakerConfig::default(),
            metrics.clone(),
        ));
        Arc::new(GatewaySession::new(transport, breaker, metrics.clone(), agent_id, partition))
    });

    let discovery = Arc::new(DiscoveryOrchestrator::new(
        config.clone(),
        integrations.clone(),
        results.clone(),
        metrics.clone(),
        gateway.clone(),
    ));
    let reconcile = Arc::new(ReconcileOrchestrator::new(config.clone(), integrations.clone(), metrics.clone()));
    let initial_intervals = {
        let config = config.read().await;
        (config.discovery_interval(), config.update_interval())
    };
    let (interval_tx, interval_rx) = crate::reload::interval_watch_channel(initial_intervals);
    let reloader = Arc::new(
        ConfigReloader::new(config.clone(), integrations.clone(), registry).with_interval_watch(interval_tx),
    );

    let mut service = Service::new(config.clone(), discovery, reconcile, reloader, gateway.clone(), interval_rx);
    let shutdown = service.shutdown_token();
    service.start().await?;

    let state = Arc::new(AppState {
        config,
        integrations,
        results,
        metrics,
        gateway,
        shutdown: shutdown.clone(),
    });

    tracing::info!(addr = %listen_addr, "syncd listening");
    let router = ingress::router(state);
    let listener = TcpListener::bind(&listen_addr).await?;

    let serve_result =
        axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await;

    service.stop().await;
    serve_result?;
    Ok(())
}
