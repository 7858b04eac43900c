// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Config reloader: applies a fresh [`Config`] or a gateway-delivered config
//! payload, rebuilding the integration table and repartitioning atomically.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tokio::sync::RwLock;

use crate::adapter::AdapterRegistry;
use crate::config::{Config, SourceConfig, TenantScope};
use crate::discovery::{Integration, IntegrationTable};
use crate::error::SyncError;

/// Shape of a config payload delivered by the gateway (distinct from the
/// full static [`Config`] — the gateway only ever redescribes sources).
#[derive(Debug, Deserialize)]
pub struct GatewayConfigPayload {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub scope: Option<TenantScope>,
    pub sources: HashMap<String, SourceConfig>,
}

/// Latest (discovery_interval, update_interval) pair installed by a reload.
/// A `watch` channel is a single-slot, non-blocking nudge: a sender never
/// blocks, and a burst of reloads before a ticker loop wakes up coalesces
/// into the one value a receiver sees on `changed()`.
pub type IntervalWatch = (Duration, Duration);

pub fn interval_watch_channel(initial: IntervalWatch) -> (watch::Sender<IntervalWatch>, watch::Receiver<IntervalWatch>) {
    watch::channel(initial)
}

pub struct ConfigReloader {
    config: Arc<RwLock<Config>>,
    integrations: Arc<IntegrationTable>,
    registry: Arc<AdapterRegistry>,
    interval_tx: Option<watch::Sender<IntervalWatch>>,
}

impl ConfigReloader {
    pub fn new(config: Arc<RwLock<Config>>, integrations: Arc<IntegrationTable>, registry: Arc<AdapterRegistry>) -> Self {
        Self { config, integrations, registry, interval_tx: None }
    }

    /// Attaches the interval-change nudge used to reset the discovery and
    /// reconciliation tickers after a reload changes either interval.
    pub fn with_interval_watch(mut self, tx: watch::Sender<IntervalWatch>) -> Self {
        self.interval_tx = Some(tx);
        self
    }

    /// Replaces the live config with `next` wholesale, validates it, then
    /// rebuilds the integration table and installs both atomically. On
    /// validation failure, the live config and integration table are left
    /// untouched. If the installed `discovery_interval`/`update_interval`
    /// differ from what was live before, nudges the ticker-reset watch so
    /// `Lifecycle`'s loops rebuild their tickers on the next iteration.
    pub async fn apply_config(&self, next: Config) -> Result<(), SyncError> {
        next.validate()?;
        let table = self.build_integration_table(&next);
        let new_intervals = (next.discovery_interval(), next.update_interval());

        let previous_intervals = {
            let mut config = self.config.write().await;
            let previous = (config.discovery_interval(), config.update_interval());
            *config = next;
            previous
        };
        *self.integrations.write().await = table;

        if let Some(tx) = &self.interval_tx {
            if previous_intervals != new_intervals {
                let _ = tx.send(new_intervals);
            }
        }
        Ok(())
    }

    /// Clones the current config, overlays it with a gateway-delivered
    /// payload (agent_id/tenant_id/scope when present, sources wholesale),
    /// validates, and installs it the same way as [`Self::apply_config`].
    pub async fn apply_gateway_payload(&self, payload: GatewayConfigPayload) -> Result<(), SyncError> {
        let mut next = self.config.read().await.clone();
        if let Some(agent_id) = payload.agent_id {
            next.agent_id = agent_id;
        }
        if let Some(tenant_id) = payload.tenant_id {
            next.tenant_id = tenant_id;
        }
        if let Some(scope) = payload.scope {
            next.tenant_scope = scope;
        }
        next.sources = payload.sources;

        self.apply_config(next).await
    }

    /// Builds adapters for every source whose `type` is registered, logging
    /// and skipping unknown types rather than failing the whole reload.
    fn build_integration_table(&self, config: &Config) -> HashMap<String, Integration> {
        let mut table = HashMap::new();
        for source in config.sources.values() {
            let Some(build_result) = self.registry.build(source) else {
                tracing::warn!(source = %source.name, source_type = %source.source_type, "unknown adapter type, skipping");
                continue;
            };
            match build_result {
                Ok(adapter) => {
                    let blacklist =
                        match crate::blacklist::NetworkBlacklist::new(&source.network_blacklist) {
                            Ok(b) => b,
                            Err(err) => {
                                tracing::warn!(source = %source.name, error = %err, "invalid blacklist, skipping source");
                                continue;
                            }
                        };
                    table.insert(source.name.clone(), Integration { adapter, blacklist });
                }
                Err(err) => {
                    tracing::warn!(source = %source.name, error = %err, "adapter construction failed, skipping source");
                }
            }
        }
        table
    }
}
