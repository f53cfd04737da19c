//! Test helpers for e2e tests
//!
//! Environment-driven settings, a polling helper, `kubectl` through the
//! bootstrap executor and a bearer-token client for the cluster-manager API.

use std::path::PathBuf;
use std::sync::{Arc, Once};
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use testbed_bootstrap::{CommandRunner, CommandSpec, ProcessRunner, DEFAULT_CLUSTER_NAME};

// =============================================================================
// Settings
// =============================================================================

/// Where the cluster-manager REST API is reachable from the test process
const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_PROJECT: &str = "e2e";
/// Fixed node identifier the created cluster is pinned to
const DEFAULT_NODE_ID: &str = "e2e-edge-node-0001";

fn env_or(var: &str, default: &str) -> String {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Settings read from the environment once per test
#[derive(Debug, Clone)]
pub struct E2eSettings {
    pub plan: PathBuf,
    pub override_json: Option<String>,
    pub cluster_name: String,
    pub api_url: String,
    pub project: String,
    pub node_id: String,
    pub keep_cluster: bool,
}

impl E2eSettings {
    pub fn from_env() -> Self {
        Self {
            plan: PathBuf::from(env_or("TESTBED_PLAN", "bootstrap.yaml")),
            override_json: std::env::var("TESTBED_PLAN_OVERRIDE").ok(),
            cluster_name: env_or("TESTBED_CLUSTER_NAME", DEFAULT_CLUSTER_NAME),
            api_url: env_or("TESTBED_CLUSTER_MANAGER_URL", DEFAULT_API_URL),
            project: env_or("TESTBED_PROJECT", DEFAULT_PROJECT),
            node_id: env_or("TESTBED_NODE_ID", DEFAULT_NODE_ID),
            keep_cluster: std::env::var("TESTBED_KEEP_CLUSTER").is_ok(),
        }
    }
}

static TRACING: Once = Once::new();

/// Install a tracing subscriber for test output
pub fn init_e2e_test() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init();
    });
}

// =============================================================================
// Generic Polling Helper
// =============================================================================

/// Poll an async condition until it returns `true` or the timeout expires.
///
/// The `condition` closure returns `Ok(true)` when done, `Ok(false)` to keep
/// polling, or `Err` to abort immediately.
pub async fn wait_for_condition<F, Fut>(
    description: &str,
    timeout: Duration,
    poll_interval: Duration,
    condition: F,
) -> Result<(), String>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<bool, String>>,
{
    let start = std::time::Instant::now();
    loop {
        if start.elapsed() > timeout {
            return Err(format!(
                "Timeout after {:?} waiting for: {}",
                timeout, description
            ));
        }
        match condition().await {
            Ok(true) => {
                info!("{} after {:?}", description, start.elapsed());
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => return Err(e),
        }
        sleep(poll_interval).await;
    }
}

// =============================================================================
// kubectl
// =============================================================================

/// The bootstrap executor, reused for assertions
pub fn runner() -> Arc<dyn CommandRunner> {
    Arc::new(ProcessRunner::new())
}

/// Run `kubectl` and return stdout
pub async fn kubectl(runner: &dyn CommandRunner, args: &[&str]) -> Result<String, String> {
    runner
        .output(&CommandSpec::kubectl(args.iter().copied()))
        .await
        .map_err(|e| e.to_string())
}

/// Names of CAPI machines that belong to `cluster`, in any namespace
pub async fn machines_for(runner: &dyn CommandRunner, cluster: &str) -> Result<Vec<String>, String> {
    let selector = format!("cluster.x-k8s.io/cluster-name={}", cluster);
    let out = kubectl(
        runner,
        &["get", "machines.cluster.x-k8s.io", "-A", "-l", &selector, "-o", "name"],
    )
    .await?;
    Ok(out.lines().filter(|l| !l.trim().is_empty()).map(str::to_string).collect())
}

/// The CAPI cluster object named `cluster`, searched in every namespace
async fn capi_cluster(runner: &dyn CommandRunner, cluster: &str) -> Result<Value, String> {
    let selector = format!("metadata.name={}", cluster);
    let out = kubectl(
        runner,
        &[
            "get",
            "clusters.cluster.x-k8s.io",
            "-A",
            "--field-selector",
            &selector,
            "-o",
            "json",
        ],
    )
    .await?;
    let list: Value = serde_json::from_str(&out).map_err(|e| e.to_string())?;
    Ok(list["items"][0].clone())
}

/// `true` once the CAPI cluster exists and every status condition is `True`
pub async fn cluster_conditions_healthy(
    runner: &dyn CommandRunner,
    cluster: &str,
) -> Result<bool, String> {
    let object = capi_cluster(runner, cluster).await?;
    Ok(conditions_all_true(&object["status"]["conditions"]))
}

/// `clusterctl describe cluster` output for `cluster`
pub async fn describe_cluster(runner: &dyn CommandRunner, cluster: &str) -> Result<String, String> {
    let object = capi_cluster(runner, cluster).await?;
    let namespace = object["metadata"]["namespace"]
        .as_str()
        .ok_or_else(|| format!("cluster {} not found", cluster))?;
    runner
        .output(&CommandSpec::clusterctl([
            "describe",
            "cluster",
            cluster,
            "-n",
            namespace,
            "--show-conditions",
            "all",
        ]))
        .await
        .map_err(|e| e.to_string())
}

fn conditions_all_true(conditions: &Value) -> bool {
    match conditions.as_array() {
        Some(items) if !items.is_empty() => items.iter().all(|c| c["status"] == "True"),
        _ => false,
    }
}

// =============================================================================
// Cluster-manager API
// =============================================================================

/// Minimal REST client for the cluster-manager API
pub struct ApiClient {
    http: reqwest::Client,
    base: String,
}

impl ApiClient {
    pub fn new(settings: &E2eSettings) -> Result<Self, String> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| e.to_string())?;
        Ok(Self {
            http,
            base: format!(
                "{}/v2/projects/{}",
                settings.api_url.trim_end_matches('/'),
                settings.project
            ),
        })
    }

    /// Send a request and return status plus JSON body (`Null` when empty)
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value), String> {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base, path))
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await.map_err(|e| e.to_string())?;
        let status = response.status();
        let text = response.text().await.map_err(|e| e.to_string())?;
        Ok((status, serde_json::from_str(&text).unwrap_or(Value::Null)))
    }
}
