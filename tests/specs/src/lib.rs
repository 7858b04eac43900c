// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for end-to-end binary smoke tests.
//!
//! Spawns the real `syncd` binary as a subprocess, backed by a config file
//! written to a temp dir, and exercises its ingress HTTP surface.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Once;
use std::time::Duration;

static CRYPTO_INIT: Once = Once::new();

/// Install the ring crypto provider for reqwest/rustls.
/// Safe to call multiple times — only the first call has effect.
pub fn ensure_crypto() {
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

/// Resolve the path to the compiled `syncd` binary.
pub fn syncd_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/specs → tests → workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("syncd")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A single `static`-adapter source to place in a generated config file.
pub struct SourceSpec {
    pub name: String,
    pub tenant_id: Option<String>,
    pub devices: serde_json::Value,
    pub network_blacklist: Vec<String>,
}

impl SourceSpec {
    pub fn new(name: &str, devices: serde_json::Value) -> Self {
        Self { name: name.to_owned(), tenant_id: None, devices, network_blacklist: Vec::new() }
    }

    pub fn with_tenant(mut self, tenant_id: &str) -> Self {
        self.tenant_id = Some(tenant_id.to_owned());
        self
    }

    pub fn with_blacklist(mut self, cidrs: &[&str]) -> Self {
        self.network_blacklist = cidrs.iter().map(|c| c.to_string()).collect();
        self
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "type": "static",
            "endpoint": "https://example.invalid",
            "credentials": { "devices_json": self.devices.to_string() },
            "tenant_id": self.tenant_id,
            "network_blacklist": self.network_blacklist,
        })
    }
}

/// A running `syncd` process that is killed on drop.
pub struct SyncdProcess {
    child: Child,
    port: u16,
    _config_dir: tempfile::TempDir,
}

impl SyncdProcess {
    /// Spawn `syncd` with a config file declaring the given sources and no
    /// gateway, listening on a freshly allocated TCP port.
    pub fn start(sources: Vec<SourceSpec>) -> anyhow::Result<Self> {
        ensure_crypto();
        let binary = syncd_binary();
        anyhow::ensure!(binary.exists(), "syncd binary not found at {}", binary.display());

        let port = free_port()?;
        let config_dir = tempfile::tempdir()?;
        let config_path = config_dir.path().join("syncd.json");

        let mut sources_obj = serde_json::Map::new();
        for s in &sources {
            sources_obj.insert(s.name.clone(), s.to_json());
        }
        let config = serde_json::json!({
            "sources": sources_obj,
            "listen_addr": format!("127.0.0.1:{port}"),
            "agent_id": "spec-agent",
            "discovery_interval": "200ms",
        });
        std::fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

        let child = Command::new(&binary)
            .args(["--config-file", &config_path.to_string_lossy()])
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(Self { child, port, _config_dir: config_dir })
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Poll `/api/v1/status` until it responds successfully.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let client = reqwest::Client::new();
        let url = format!("{}/api/v1/status", self.base_url());
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("syncd did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Wait for the process to exit within `timeout`.
    pub async fn wait_exit(&mut self, timeout: Duration) -> anyhow::Result<std::process::ExitStatus> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("syncd did not exit within {timeout:?}");
            }
            if let Some(status) = self.child.try_wait()? {
                return Ok(status);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for SyncdProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
