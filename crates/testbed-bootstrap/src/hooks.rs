//! Post-bootstrap hooks
//!
//! Hooks run after every component of the plan is installed. They are how
//! environment-specific steps (such as attaching an edge node) plug into the
//! one planner instead of forking it.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::exec::{CommandRunner, CommandSpec};
use crate::plan::ArgLine;
use crate::Result;

/// How long `kubectl wait` may block on an emulated edge node
const EDGE_NODE_WAIT_TIMEOUT: &str = "600s";

/// A step run once the plan has been applied
#[async_trait]
pub trait PostBootstrapHook: Send + Sync {
    fn name(&self) -> &str;

    /// Programs this hook needs on `PATH`.
    fn required_tools(&self) -> Vec<String> {
        Vec::new()
    }

    async fn run(&self, runner: &dyn CommandRunner) -> Result<()>;
}

/// Which edge-node environment to attach
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EdgeNode {
    /// Emulated node running as pods inside the management cluster
    InCluster {
        manifest: PathBuf,
        namespace: String,
        selector: String,
    },
    /// Externally provisioned virtual machine
    Virtual { provision: ArgLine },
}

/// Attaches an edge node to the freshly bootstrapped cluster
#[derive(Debug, Clone)]
pub struct EdgeNodeHook {
    node: EdgeNode,
}

impl EdgeNodeHook {
    pub fn in_cluster(
        manifest: impl Into<PathBuf>,
        namespace: impl Into<String>,
        selector: impl Into<String>,
    ) -> Self {
        Self {
            node: EdgeNode::InCluster {
                manifest: manifest.into(),
                namespace: namespace.into(),
                selector: selector.into(),
            },
        }
    }

    pub fn virtual_node(provision: ArgLine) -> Self {
        Self {
            node: EdgeNode::Virtual { provision },
        }
    }

    pub fn node(&self) -> &EdgeNode {
        &self.node
    }

    fn commands(&self) -> Result<Vec<CommandSpec>> {
        match &self.node {
            EdgeNode::InCluster {
                manifest,
                namespace,
                selector,
            } => Ok(vec![
                CommandSpec::kubectl([
                    "apply".to_string(),
                    "-n".to_string(),
                    namespace.clone(),
                    "-f".to_string(),
                    manifest.to_string_lossy().into_owned(),
                ]),
                CommandSpec::kubectl([
                    "wait".to_string(),
                    "-n".to_string(),
                    namespace.clone(),
                    "--for=condition=Ready".to_string(),
                    "pod".to_string(),
                    "-l".to_string(),
                    selector.clone(),
                    format!("--timeout={}", EDGE_NODE_WAIT_TIMEOUT),
                ]),
            ]),
            EdgeNode::Virtual { provision } => Ok(vec![provision.to_command()?]),
        }
    }
}

#[async_trait]
impl PostBootstrapHook for EdgeNodeHook {
    fn name(&self) -> &str {
        match self.node {
            EdgeNode::InCluster { .. } => "edge-node-in-cluster",
            EdgeNode::Virtual { .. } => "edge-node-virtual",
        }
    }

    fn required_tools(&self) -> Vec<String> {
        match self.commands() {
            Ok(commands) => commands.iter().map(|c| c.program().to_string()).collect(),
            Err(_) => Vec::new(),
        }
    }

    async fn run(&self, runner: &dyn CommandRunner) -> Result<()> {
        info!(hook = self.name(), "attaching edge node");
        for command in self.commands()? {
            runner.run(&command).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::MockCommandRunner;
    use crate::BootstrapError;
    use mockall::Sequence;

    #[tokio::test]
    async fn in_cluster_node_applies_then_waits() {
        let mut runner = MockCommandRunner::new();
        let mut seq = Sequence::new();
        runner
            .expect_run()
            .withf(|c| c.program() == "kubectl" && c.get_args()[0] == "apply")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        runner
            .expect_run()
            .withf(|c| {
                c.get_args()[0] == "wait" && c.get_args().contains(&"app=enic".to_string())
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let hook = EdgeNodeHook::in_cluster("/manifests/enic.yaml", "enic", "app=enic");
        hook.run(&runner).await.unwrap();
        assert_eq!(hook.required_tools(), ["kubectl", "kubectl"]);
    }

    #[tokio::test]
    async fn virtual_node_runs_provisioning_command() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|c| c.program() == "./provision-ven.sh" && c.get_args() == ["--name", "ven 1"])
            .times(1)
            .returning(|_| Ok(()));

        let hook = EdgeNodeHook::virtual_node(ArgLine::from("./provision-ven.sh --name 'ven 1'"));
        assert_eq!(hook.name(), "edge-node-virtual");
        hook.run(&runner).await.unwrap();
    }

    #[tokio::test]
    async fn failure_stops_hook() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .times(1)
            .returning(|c| Err(BootstrapError::exec(c.to_string(), "exit status: 1", "")));

        let hook = EdgeNodeHook::in_cluster("m.yaml", "enic", "app=enic");
        assert!(hook.run(&runner).await.is_err());
    }
}
