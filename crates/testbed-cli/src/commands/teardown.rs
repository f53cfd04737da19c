//! Teardown command - delete the kind cluster

use std::path::PathBuf;

use clap::Args;

use testbed_bootstrap::{Planner, PlannerConfig, DEFAULT_CLUSTER_NAME};

use crate::Result;

/// Teardown command arguments
#[derive(Args, Debug)]
pub struct TeardownArgs {
    /// kind cluster name
    #[arg(long, env = "TESTBED_CLUSTER_NAME", default_value = DEFAULT_CLUSTER_NAME)]
    pub cluster_name: String,

    /// Kubeconfig the cluster was created with
    #[arg(long, env = "TESTBED_KUBECONFIG")]
    pub kubeconfig: Option<PathBuf>,

    /// Log the delete command instead of running it
    #[arg(long)]
    pub dry_run: bool,
}

/// Run the teardown command
pub async fn run(args: TeardownArgs) -> Result<()> {
    let mut config = PlannerConfig::default()
        .with_cluster_name(args.cluster_name)
        .with_dry_run(args.dry_run);
    if let Some(kubeconfig) = args.kubeconfig {
        config = config.with_kubeconfig(kubeconfig);
    }
    Planner::from_config(config).delete_cluster().await?;
    Ok(())
}
