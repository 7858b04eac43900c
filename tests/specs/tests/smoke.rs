// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end smoke tests that spawn the real `syncd` binary and exercise
//! its ingress HTTP surface against a static, gateway-less configuration.

use std::time::Duration;

use syncd_specs::{SourceSpec, SyncdProcess};

const TIMEOUT: Duration = Duration::from_secs(10);

fn one_device(id: &str, ip: &str) -> serde_json::Value {
    serde_json::json!([{
        "device_id": id,
        "ip": ip,
        "hostname": null,
        "source": "static",
        "agent_id": "",
        "poller_id": "",
        "is_available": true,
        "timestamp": 0,
        "metadata": {},
    }])
}

/// Extracts and parses the JSON-encoded `message` field of a `/api/v1/status`
/// response into its inner `{status, sources, devices, last_discovery,
/// timestamp}` object.
fn status_message(resp: &serde_json::Value) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::from_str(resp["message"].as_str().ok_or_else(|| anyhow::anyhow!("message not a string"))?)?)
}

#[tokio::test]
async fn status_echoes_agent_id_and_service_shape_with_no_gateway() -> anyhow::Result<()> {
    let source = SourceSpec::new("fixture", one_device("d1", "10.0.0.1"));
    let syncd = SyncdProcess::start(vec![source])?;
    syncd.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/v1/status", syncd.base_url())).await?.json().await?;

    assert_eq!(resp["available"], true);
    assert_eq!(resp["agent_id"], "spec-agent");
    assert_eq!(resp["service_type"], "sync");

    let message = status_message(&resp)?;
    assert_eq!(message["status"], "healthy");

    Ok(())
}

#[tokio::test]
async fn config_endpoint_reflects_the_loaded_source() -> anyhow::Result<()> {
    let source = SourceSpec::new("fixture", one_device("d1", "10.0.0.1")).with_tenant("tenant-a");
    let syncd = SyncdProcess::start(vec![source])?;
    syncd.wait_healthy(TIMEOUT).await?;

    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/v1/config", syncd.base_url())).await?.json().await?;

    assert!(resp["sources"]["fixture"].is_object());
    assert_eq!(resp["sources"]["fixture"]["tenant_id"], "tenant-a");

    Ok(())
}

#[tokio::test]
async fn results_endpoint_is_not_implemented() -> anyhow::Result<()> {
    let source = SourceSpec::new("fixture", one_device("d1", "10.0.0.1"));
    let syncd = SyncdProcess::start(vec![source])?;
    syncd.wait_healthy(TIMEOUT).await?;

    let resp = reqwest::get(format!("{}/api/v1/results", syncd.base_url())).await?;
    assert_eq!(resp.status().as_u16(), 501);

    Ok(())
}

#[tokio::test]
async fn discovery_tick_populates_the_results_totals() -> anyhow::Result<()> {
    let source = SourceSpec::new("fixture", one_device("d1", "10.0.0.1"));
    let syncd = SyncdProcess::start(vec![source])?;
    syncd.wait_healthy(TIMEOUT).await?;

    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/status", syncd.base_url());
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("discovery never populated the devices count");
        }
        let resp: serde_json::Value = client.get(&url).send().await?.json().await?;
        if status_message(&resp)?["devices"] == 1 {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

#[tokio::test]
async fn blacklisted_device_never_reaches_the_results_totals() -> anyhow::Result<()> {
    let source = SourceSpec::new("fixture", one_device("d1", "10.0.0.1")).with_blacklist(&["10.0.0.0/8"]);
    let syncd = SyncdProcess::start(vec![source])?;
    syncd.wait_healthy(TIMEOUT).await?;

    // Give discovery a few ticks to run, then confirm the filtered device
    // never shows up.
    tokio::time::sleep(Duration::from_millis(600)).await;
    let resp: serde_json::Value =
        reqwest::get(format!("{}/api/v1/status", syncd.base_url())).await?.json().await?;
    assert_eq!(status_message(&resp)?["devices"], 0);

    Ok(())
}
