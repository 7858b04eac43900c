// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Source adapter contract and the factory registry that builds adapter
//! instances from a [`SourceConfig`].
//!
//! Concrete source adapters (their HTTP/JSON details, pagination,
//! authentication caching) are out of scope for this crate — callers
//! register their own factories. A `static` adapter is included purely as
//! scaffolding so the orchestrators are runnable and testable without a real
//! external collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SourceConfig;
use crate::device::DeviceUpdate;
use crate::error::SyncError;

/// Narrow capability exposed by every registered source type: fetch
/// (discovery) and reconcile (availability push-back). Both are cancellable
/// via the caller's `CancellationToken`-derived deadline; this trait itself
/// stays transport-agnostic, leaving HTTP details to each adapter.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Pure discovery. Must be safe to call concurrently across different
    /// source instances; not required to be safe to call concurrently with
    /// itself (the discovery orchestrator never does).
    async fn fetch(&self) -> Result<Vec<DeviceUpdate>, SyncError>;

    /// Side-effecting update to the external system.
    async fn reconcile(&self) -> Result<(), SyncError>;
}

/// Builds an [`Adapter`] for one source configuration. Factories are
/// synchronous and infallible at registration time; adapter construction
/// itself may still fail (e.g. malformed endpoint), surfaced as a boxed
/// error at build time so the reloader can log-and-skip per source.
pub type AdapterFactory = Arc<dyn Fn(&SourceConfig) -> Result<Arc<dyn Adapter>, SyncError> + Send + Sync>;

/// Maps a source `type` string to the factory that builds its adapter.
/// Unknown types are logged and skipped by the config reloader, never fatal.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source_type: impl Into<String>, factory: AdapterFactory) {
        self.factories.insert(source_type.into(), factory);
    }

    pub fn contains(&self, source_type: &str) -> bool {
        self.factories.contains_key(source_type)
    }

    pub fn build(&self, config: &SourceConfig) -> Option<Result<Arc<dyn Adapter>, SyncError>> {
        self.factories.get(&config.source_type).map(|f| f(config))
    }

    /// Registry pre-populated with the built-in `static` adapter, so a
    /// process can boot and exercise the orchestrators without a real
    /// external collaborator registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("static", Arc::new(|config: &SourceConfig| {
            Ok(Arc::new(StaticAdapter::from_config(config)) as Arc<dyn Adapter>)
        }));
        registry
    }
}

/// Scaffolding adapter that serves a fixed device list read from the
/// source's `credentials` map (key `devices_json`, a JSON array of
/// `DeviceUpdate`). `reconcile` is a no-op success. Useful for boot-testing
/// the orchestrators and for unit tests; not a real collaborator.
pub struct StaticAdapter {
    name: String,
    devices: Vec<DeviceUpdate>,
}

impl StaticAdapter {
    pub fn from_config(config: &SourceConfig) -> Self {
        let devices = config
            .credentials
            .get("devices_json")
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();
        Self { name: config.name.clone(), devices }
    }

    pub fn new(name: impl Into<String>, devices: Vec<DeviceUpdate>) -> Self {
        Self { name: name.into(), devices }
    }
}

#[async_trait]
impl Adapter for StaticAdapter {
    async fn fetch(&self) -> Result<Vec<DeviceUpdate>, SyncError> {
        tracing::debug!(source = %self.name, count = self.devices.len(), "static adapter fetch");
        Ok(self.devices.clone())
    }

    async fn reconcile(&self) -> Result<(), SyncError> {
        tracing::debug!(source = %self.name, "static adapter reconcile");
        Ok(())
    }
}
