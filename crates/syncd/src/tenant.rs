// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tenant partitioner and per-tenant results store.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::RwLock;

use crate::config::{Config, SourceConfig, TenantScope};

/// One tenant's bucket of sources plus its resolved slug.
#[derive(Debug, Clone, Default)]
pub struct TenantBucket {
    pub tenant_slug: String,
    pub sources: Vec<SourceConfig>,
}

/// Groups the current source set into tenant buckets, applying the
/// service's scope rule to sources that omit `tenant_id`.
///
/// - A source with `tenant_id` lands in that bucket.
/// - A source without `tenant_id`, under `TenantScope::Tenant`, inherits the
///   service's default tenant (`config.tenant_id`/`config.tenant_slug`).
/// - A source without `tenant_id`, under `TenantScope::Platform`, is dropped
///   with a warning.
///
/// The slug recorded per tenant is the first non-empty slug encountered
/// while grouping (iteration order over `config.sources`, a `HashMap`, is
/// unspecified — ties only matter when sources disagree on slug, which is a
/// misconfiguration this function doesn't otherwise constrain).
pub fn partition_by_tenant(config: &Config) -> HashMap<String, TenantBucket> {
    let mut buckets: HashMap<String, TenantBucket> = HashMap::new();

    for source in config.sources.values() {
        let (tenant_id, tenant_slug) = match &source.tenant_id {
            Some(id) if !id.is_empty() => {
                (id.clone(), source.tenant_slug.clone().unwrap_or_default())
            }
            _ => match config.tenant_scope {
                TenantScope::Tenant => (config.tenant_id.clone(), config.tenant_slug.clone()),
                TenantScope::Platform => {
                    tracing::warn!(source = %source.name, "dropping source with no tenant_id under platform scope");
                    continue;
                }
            },
        };

        let bucket = buckets.entry(tenant_id).or_default();
        if bucket.tenant_slug.is_empty() && !tenant_slug.is_empty() {
            bucket.tenant_slug = tenant_slug;
        }
        bucket.sources.push(source.clone());
    }

    buckets
}

/// Per-tenant device/source counts and last-updated timestamp, one instance
/// per observed tenant, created lazily on first discovery that yields
/// devices for that tenant.
#[derive(Debug, Clone, Default)]
pub struct ResultsSnapshot {
    pub device_count: usize,
    pub source_count: usize,
    pub updated_unix: i64,
}

/// Guards the per-tenant [`ResultsSnapshot`] table behind a single
/// read/write lock; writers are only the discovery orchestrator.
#[derive(Default)]
pub struct ResultsStore {
    inner: RwLock<HashMap<String, ResultsSnapshot>>,
}

impl ResultsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, tenant_id: &str, device_count: usize, source_count: usize) -> i64 {
        let updated_unix = now_unix();
        let mut guard = self.inner.write().await;
        guard.insert(
            tenant_id.to_owned(),
            ResultsSnapshot { device_count, source_count, updated_unix },
        );
        updated_unix
    }

    pub async fn get(&self, tenant_id: &str) -> Option<ResultsSnapshot> {
        self.inner.read().await.get(tenant_id).cloned()
    }

    pub async fn totals(&self) -> (usize, usize) {
        let guard = self.inner.read().await;
        let devices = guard.values().map(|s| s.device_count).sum();
        let sources = guard.values().map(|s| s.source_count).sum();
        (devices, sources)
    }

    pub async fn last_discovery_unix(&self) -> i64 {
        self.inner.read().await.values().map(|s| s.updated_unix).max().unwrap_or(0)
    }
}

/// Unix-second wall clock, used as the per-tenant sequence string. Can
/// repeat across ties within the same second or across process restarts;
/// consumers are assumed tolerant (see SPEC_FULL.md Open Question 1).
pub fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}
