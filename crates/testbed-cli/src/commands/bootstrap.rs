//! Bootstrap command - create the kind cluster and install the plan
//!
//! ```text
//! testbed bootstrap --plan bootstrap.yaml --edge-node enic \
//!     --edge-node-manifest enic.yaml
//! ```
//!
//! CI pipelines normally drive this through `TESTBED_PLAN`,
//! `TESTBED_PLAN_OVERRIDE` and `TESTBED_CLUSTER_NAME` instead of flags.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use tracing::info;

use testbed_bootstrap::{ArgLine, EdgeNodeHook, Planner, PlannerConfig, DEFAULT_CLUSTER_NAME};

use super::PlanSource;
use crate::{Error, Result};

/// Edge node environment attached after the plan is applied
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EdgeNodeKind {
    /// Emulated node running as pods in the management cluster
    Enic,
    /// Virtual machine provisioned by an external command
    Ven,
}

/// Bootstrap command arguments
#[derive(Args, Debug)]
pub struct BootstrapArgs {
    #[command(flatten)]
    pub source: PlanSource,

    /// Root of the per-component working directories
    #[arg(long, env = "TESTBED_WORK_DIR")]
    pub work_dir: Option<PathBuf>,

    /// kind cluster name
    #[arg(long, env = "TESTBED_CLUSTER_NAME", default_value = DEFAULT_CLUSTER_NAME)]
    pub cluster_name: String,

    /// Kubeconfig kind writes and every command uses
    #[arg(long, env = "TESTBED_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Log commands instead of running them
    #[arg(long)]
    pub dry_run: bool,

    /// Leave the cluster in place when bootstrap fails
    #[arg(long)]
    pub keep_on_failure: bool,

    /// Attach an edge node once every component is installed
    #[arg(long, value_enum)]
    pub edge_node: Option<EdgeNodeKind>,

    /// Manifest of the emulated edge node (with `--edge-node enic`)
    #[arg(long)]
    pub edge_node_manifest: Option<PathBuf>,

    /// Namespace the emulated edge node runs in
    #[arg(long, default_value = "enic")]
    pub edge_node_namespace: String,

    /// Label selector of the emulated edge node pods
    #[arg(long, default_value = "app=enic")]
    pub edge_node_selector: String,

    /// Command that provisions the virtual edge node (with `--edge-node ven`)
    #[arg(long)]
    pub ven_command: Option<String>,
}

impl BootstrapArgs {
    fn planner_config(&self) -> PlannerConfig {
        let mut config = PlannerConfig::default()
            .with_cluster_name(&self.cluster_name)
            .with_keep_on_failure(self.keep_on_failure)
            .with_dry_run(self.dry_run);
        if let Some(dir) = &self.work_dir {
            config = config.with_work_dir(dir);
        }
        if let Some(kubeconfig) = &self.kubeconfig {
            config = config.with_kubeconfig(kubeconfig);
        }
        config
    }

    fn edge_node_hook(&self) -> Result<Option<EdgeNodeHook>> {
        match self.edge_node {
            None => Ok(None),
            Some(EdgeNodeKind::Enic) => {
                let manifest = self.edge_node_manifest.as_ref().ok_or_else(|| {
                    Error::validation("--edge-node enic requires --edge-node-manifest")
                })?;
                Ok(Some(EdgeNodeHook::in_cluster(
                    manifest,
                    &self.edge_node_namespace,
                    &self.edge_node_selector,
                )))
            }
            Some(EdgeNodeKind::Ven) => {
                let command = self
                    .ven_command
                    .as_deref()
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| Error::validation("--edge-node ven requires --ven-command"))?;
                Ok(Some(EdgeNodeHook::virtual_node(ArgLine::from(command))))
            }
        }
    }
}

/// Run the bootstrap command
pub async fn run(args: BootstrapArgs) -> Result<()> {
    let plan = args.source.load()?;
    let hook = args.edge_node_hook()?;

    let mut planner = Planner::from_config(args.planner_config());
    if let Some(hook) = hook {
        planner = planner.with_hook(hook);
    }

    info!(
        cluster = %args.cluster_name,
        components = plan.active_components().count(),
        dry_run = args.dry_run,
        "bootstrapping"
    );
    planner.run(&plan).await?;
    Ok(())
}
