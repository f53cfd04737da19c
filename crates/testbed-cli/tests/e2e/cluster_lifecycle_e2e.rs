//! Cluster lifecycle through the cluster-manager API
//!
//! bootstrap → import template → create cluster → machine appears →
//! conditions healthy → delete → gone. Tokens that are expired or signed by
//! a foreign issuer must be turned away with 401.
//!
//! ```bash
//! cargo test -p testbed-cli --features cluster-e2e --test e2e cluster_lifecycle_e2e -- --ignored --nocapture
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{info, warn};

use testbed_bootstrap::{CommandRunner, CommandSpec, Planner, PlannerConfig};
use testbed_cli::commands::PlanSource;
use testbed_identity::manifest::DEFAULT_NAMESPACE;
use testbed_identity::{shared_identity, IssuerConfig, MockIdpManifest, TestIdentity, TokenRequest};

use super::helpers::{
    cluster_conditions_healthy, describe_cluster, init_e2e_test, machines_for, runner,
    wait_for_condition, ApiClient, E2eSettings,
};

const E2E_TIMEOUT: Duration = Duration::from_secs(3600);
const POLL_INTERVAL: Duration = Duration::from_secs(5);
const TEMPLATE_READY_TIMEOUT: Duration = Duration::from_secs(60);
const MACHINE_TIMEOUT: Duration = Duration::from_secs(60);
const HEALTHY_TIMEOUT: Duration = Duration::from_secs(600);
const DELETE_TIMEOUT: Duration = Duration::from_secs(60);

const TEMPLATE_NAME: &str = "baseline";
const TEMPLATE_VERSION: &str = "v0.1.0";
const CLUSTER_NAME: &str = "e2e-lifecycle";
const API_AUDIENCE: &str = "cluster-manager";

#[tokio::test]
#[ignore]
async fn cluster_lifecycle_e2e() {
    init_e2e_test();
    let settings = E2eSettings::from_env();
    info!(cluster = %settings.cluster_name, "starting E2E test: cluster lifecycle");

    let result = tokio::time::timeout(E2E_TIMEOUT, run(&settings)).await;
    if !settings.keep_cluster {
        teardown(&settings).await;
    }
    match result {
        Ok(Ok(())) => info!("TEST PASSED: cluster lifecycle"),
        Ok(Err(e)) => panic!("cluster lifecycle E2E failed: {}", e),
        Err(_) => panic!("cluster lifecycle E2E timed out after {:?}", E2E_TIMEOUT),
    }
}

async fn run(settings: &E2eSettings) -> Result<(), String> {
    let planner = bootstrap(settings).await?;
    let runner = planner.runner();
    let identity = shared_identity().map_err(|e| e.to_string())?;
    deploy_mock_idp(runner.as_ref(), &identity).await?;

    let api = ApiClient::new(settings)?;
    let token = identity
        .issue_request(
            &TokenRequest::new("e2e-admin")
                .audience(API_AUDIENCE)
                .role(format!("{}_cluster-manager-write", settings.project))
                .role(format!("{}_cluster-manager-read", settings.project)),
        )
        .map_err(|e| e.to_string())?;

    rejects_bad_tokens(&api, &identity).await?;
    import_template(&api, &token).await?;
    create_cluster(&api, &token, settings).await?;

    wait_for_condition(
        "infrastructure machine created",
        MACHINE_TIMEOUT,
        POLL_INTERVAL,
        || {
            let runner = runner.clone();
            async move { Ok(!machines_for(runner.as_ref(), CLUSTER_NAME).await?.is_empty()) }
        },
    )
    .await?;

    wait_for_condition(
        "cluster conditions healthy",
        HEALTHY_TIMEOUT,
        POLL_INTERVAL,
        || {
            let runner = runner.clone();
            async move {
                // Not found yet or not parseable yet both mean "keep polling".
                Ok(cluster_conditions_healthy(runner.as_ref(), CLUSTER_NAME)
                    .await
                    .unwrap_or(false))
            }
        },
    )
    .await?;

    let description = describe_cluster(runner.as_ref(), CLUSTER_NAME).await?;
    if !description.contains(CLUSTER_NAME) {
        return Err(format!("clusterctl describe does not list {}:\n{}", CLUSTER_NAME, description));
    }
    info!("{}", description);

    delete_cluster(&api, &token).await
}

async fn bootstrap(settings: &E2eSettings) -> Result<Planner, String> {
    let source = PlanSource {
        plan: settings.plan.clone(),
        override_json: settings.override_json.clone(),
    };
    let plan = source.load().map_err(|e| e.to_string())?;
    let planner = Planner::new(
        PlannerConfig::default()
            .with_cluster_name(&settings.cluster_name)
            .with_keep_on_failure(settings.keep_cluster),
        runner(),
    );
    planner.run(&plan).await.map_err(|e| e.to_string())?;
    Ok(planner)
}

async fn deploy_mock_idp(runner: &dyn CommandRunner, identity: &TestIdentity) -> Result<(), String> {
    let manifest = MockIdpManifest::default()
        .render(identity)
        .map_err(|e| e.to_string())?;
    let dir = tempfile::tempdir().map_err(|e| e.to_string())?;
    let path = dir.path().join("mock-idp.yaml");
    std::fs::write(&path, manifest).map_err(|e| e.to_string())?;

    let path = path.to_string_lossy().into_owned();
    runner
        .run(&CommandSpec::kubectl(["apply", "-f", path.as_str()]))
        .await
        .map_err(|e| e.to_string())?;
    runner
        .run(&CommandSpec::kubectl([
            "rollout",
            "status",
            "deployment/mock-idp",
            "-n",
            DEFAULT_NAMESPACE,
            "--timeout=120s",
        ]))
        .await
        .map_err(|e| e.to_string())
}

async fn rejects_bad_tokens(api: &ApiClient, identity: &TestIdentity) -> Result<(), String> {
    let an_hour_ago = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| e.to_string())?
        .as_secs()
        - 3600;
    let expired = identity
        .issue_request(
            &TokenRequest::new("e2e-admin")
                .audience(API_AUDIENCE)
                .claim("iat", an_hour_ago - 60)
                .claim("nbf", an_hour_ago - 60)
                .claim("exp", an_hour_ago),
        )
        .map_err(|e| e.to_string())?;

    let foreign = TestIdentity::from_provider(
        &testbed_identity::EphemeralKeyProvider::new(),
        IssuerConfig::default().with_issuer_url("http://foreign-idp.invalid/realms/master"),
    )
    .and_then(|other| other.issue("e2e-admin", [API_AUDIENCE], []))
    .map_err(|e| e.to_string())?;

    for (label, token) in [("expired", expired), ("foreign issuer", foreign)] {
        let (status, _) = api.send(Method::GET, "/templates", &token, None).await?;
        if status != StatusCode::UNAUTHORIZED {
            return Err(format!("{} token got {}, expected 401", label, status));
        }
        info!("{} token rejected", label);
    }
    Ok(())
}

async fn import_template(api: &ApiClient, token: &str) -> Result<(), String> {
    let template = json!({
        "name": TEMPLATE_NAME,
        "version": TEMPLATE_VERSION,
        "kubernetesVersion": "v1.30.6",
        "description": "lifecycle e2e baseline",
        "clusterconfig": {},
    });
    let (status, body) = api
        .send(Method::POST, "/templates", token, Some(&template))
        .await?;
    if !status.is_success() {
        return Err(format!("import template: {} {}", status, body));
    }

    wait_for_condition(
        "template ready",
        TEMPLATE_READY_TIMEOUT,
        POLL_INTERVAL,
        move || async move {
            let (status, body) = api.send(Method::GET, "/templates", token, None).await?;
            Ok(status.is_success() && template_listed(&body))
        },
    )
    .await
}

fn template_listed(body: &Value) -> bool {
    body["templateInfoList"]
        .as_array()
        .is_some_and(|list| {
            list.iter()
                .any(|t| t["name"] == TEMPLATE_NAME && t["version"] == TEMPLATE_VERSION)
        })
}

async fn create_cluster(api: &ApiClient, token: &str, settings: &E2eSettings) -> Result<(), String> {
    let spec = json!({
        "name": CLUSTER_NAME,
        "template": format!("{}-{}", TEMPLATE_NAME, TEMPLATE_VERSION),
        "nodes": [{ "id": settings.node_id, "role": "all" }],
    });
    let (status, body) = api.send(Method::POST, "/clusters", token, Some(&spec)).await?;
    if !status.is_success() {
        return Err(format!("create cluster: {} {}", status, body));
    }
    info!(cluster = CLUSTER_NAME, node = %settings.node_id, "cluster requested");
    Ok(())
}

async fn delete_cluster(api: &ApiClient, token: &str) -> Result<(), String> {
    let path = format!("/clusters/{}", CLUSTER_NAME);
    let (status, body) = api.send(Method::DELETE, &path, token, None).await?;
    if !status.is_success() {
        return Err(format!("delete cluster: {} {}", status, body));
    }

    let path = path.as_str();
    wait_for_condition("cluster deleted", DELETE_TIMEOUT, POLL_INTERVAL, move || async move {
        let (status, _) = api.send(Method::GET, path, token, None).await?;
        Ok(status == StatusCode::NOT_FOUND)
    })
    .await
}

async fn teardown(settings: &E2eSettings) {
    let planner = Planner::new(
        PlannerConfig::default().with_cluster_name(&settings.cluster_name),
        runner(),
    );
    if let Err(e) = planner.delete_cluster().await {
        warn!(error = %e, "failed to delete kind cluster");
    }
}
