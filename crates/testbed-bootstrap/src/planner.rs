//! Bootstrap planner
//!
//! Turns a merged [`BootstrapPlan`] into a running set of components on a kind
//! cluster. Components are applied strictly in plan order and every step is
//! fail-fast: the first command that exits non-zero aborts the run and is
//! reported with its full command line. Nothing is retried or rolled back,
//! except that a cluster created by a failed [`Planner::run`] is deleted
//! unless `keep_on_failure` is set.

use std::path::{Component as PathComponent, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::exec::{CommandRunner, CommandSpec, DryRunRunner, EnvRunner, ProcessRunner};
use crate::hooks::PostBootstrapHook;
use crate::plan::{BootstrapPlan, ComponentSpec};
use crate::{git, helm, make, BootstrapError, Result};

/// Default kind cluster name
pub const DEFAULT_CLUSTER_NAME: &str = "testbed";

/// Planner configuration
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Root of the per-component working directories
    pub work_dir: PathBuf,
    /// kind cluster name
    pub cluster_name: String,
    /// Kubeconfig written by kind and exported to every command
    pub kubeconfig: Option<PathBuf>,
    /// Leave a cluster created by a failed run in place for debugging
    pub keep_on_failure: bool,
    /// Log commands instead of running them
    pub dry_run: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("testbed-work"),
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            kubeconfig: None,
            keep_on_failure: false,
            dry_run: false,
        }
    }
}

impl PlannerConfig {
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = name.into();
        self
    }

    pub fn with_kubeconfig(mut self, kubeconfig: impl Into<PathBuf>) -> Self {
        self.kubeconfig = Some(kubeconfig.into());
        self
    }

    pub fn with_keep_on_failure(mut self, keep: bool) -> Self {
        self.keep_on_failure = keep;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Applies bootstrap plans
pub struct Planner {
    config: PlannerConfig,
    runner: Arc<dyn CommandRunner>,
    hooks: Vec<Box<dyn PostBootstrapHook>>,
}

impl Planner {
    /// Create a planner that spawns real processes, or only logs them when
    /// `config.dry_run` is set.
    pub fn from_config(config: PlannerConfig) -> Self {
        let runner: Arc<dyn CommandRunner> = if config.dry_run {
            Arc::new(DryRunRunner)
        } else {
            Arc::new(ProcessRunner::new())
        };
        Self::new(config, runner)
    }

    /// Create a planner on top of an explicit command runner.
    pub fn new(config: PlannerConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let runner = match &config.kubeconfig {
            Some(path) => Arc::new(
                EnvRunner::new(runner).env("KUBECONFIG", path.to_string_lossy().into_owned()),
            ) as Arc<dyn CommandRunner>,
            None => runner,
        };
        Self {
            config,
            runner,
            hooks: Vec::new(),
        }
    }

    /// Register a hook to run after the plan is applied.
    pub fn with_hook(mut self, hook: impl PostBootstrapHook + 'static) -> Self {
        self.hooks.push(Box::new(hook));
        self
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// The executor, for `kubectl`/`clusterctl` assertions after bootstrap.
    pub fn runner(&self) -> Arc<dyn CommandRunner> {
        Arc::clone(&self.runner)
    }

    /// Prerequisites, cluster, components, hooks.
    ///
    /// On failure a cluster created by this call is deleted again unless
    /// `keep_on_failure` is set. A pre-existing cluster is never deleted.
    pub async fn run(&self, plan: &BootstrapPlan) -> Result<()> {
        plan.validate()?;
        self.check_prerequisites(plan).await?;
        let created = self.create_cluster(&plan.kind_cluster_config).await?;

        let result = match self.apply(plan).await {
            Ok(()) => self.run_hooks().await,
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            if created && !self.config.keep_on_failure {
                warn!(cluster = %self.config.cluster_name, error = %e, "bootstrap failed, deleting cluster");
                if let Err(cleanup) = self.delete_cluster().await {
                    warn!(error = %cleanup, "failed to delete cluster after failed bootstrap");
                }
            }
        } else {
            info!(cluster = %self.config.cluster_name, "bootstrap complete");
        }

        result
    }

    /// Programs the plan and the registered hooks will invoke, in first-use order.
    pub fn required_tools(&self, plan: &BootstrapPlan) -> Result<Vec<String>> {
        let mut tools = vec!["kind".to_string()];
        let mut push = |tool: &str| {
            if !tools.iter().any(|t| t == tool) {
                tools.push(tool.to_string());
            }
        };

        for component in plan.active_components() {
            for hook in &component.pre_install_commands {
                push(hook.to_command()?.program());
            }
            if component.installs_from_package() {
                if !component.package_releases.is_empty() {
                    push("helm");
                }
            } else {
                if !component.source_repo.url.is_empty() {
                    push("git");
                }
                if !component.build_targets.is_empty() {
                    push("make");
                }
            }
            for hook in &component.post_install_commands {
                push(hook.to_command()?.program());
            }
        }
        for hook in &self.hooks {
            for tool in hook.required_tools() {
                push(&tool);
            }
        }

        Ok(tools)
    }

    /// Fail with [`BootstrapError::MissingTool`] for the first needed program
    /// that is not on `PATH`.
    pub async fn check_prerequisites(&self, plan: &BootstrapPlan) -> Result<()> {
        for tool in self.required_tools(plan)? {
            // Relative paths like ./provision.sh are resolved at run time.
            if tool.contains('/') {
                continue;
            }
            if !self.runner.is_available(&tool).await {
                return Err(BootstrapError::MissingTool {
                    hint: install_hint(&tool),
                    tool,
                });
            }
            debug!(tool = %tool, "found");
        }
        Ok(())
    }

    async fn cluster_exists(&self) -> Result<bool> {
        let clusters = self
            .runner
            .output(&CommandSpec::new("kind").args(["get", "clusters"]))
            .await?;
        Ok(clusters
            .lines()
            .any(|line| line.trim() == self.config.cluster_name))
    }

    /// Create the kind cluster, reusing one that already exists.
    ///
    /// Returns `true` when a new cluster was created.
    pub async fn create_cluster(&self, config_ref: &str) -> Result<bool> {
        let name = &self.config.cluster_name;
        if self.cluster_exists().await? {
            info!(cluster = %name, "reusing existing kind cluster");
            return Ok(false);
        }

        info!(cluster = %name, "creating kind cluster");
        let mut cmd = CommandSpec::new("kind").args(["create", "cluster", "--name", name.as_str()]);
        if !config_ref.is_empty() {
            cmd = cmd.args(["--config", config_ref]);
        }
        if let Some(kubeconfig) = &self.config.kubeconfig {
            cmd = cmd.arg("--kubeconfig").arg(kubeconfig.to_string_lossy());
        }
        self.runner.run(&cmd).await?;
        Ok(true)
    }

    pub async fn delete_cluster(&self) -> Result<()> {
        info!(cluster = %self.config.cluster_name, "deleting kind cluster");
        let mut cmd = CommandSpec::new("kind").args([
            "delete",
            "cluster",
            "--name",
            self.config.cluster_name.as_str(),
        ]);
        if let Some(kubeconfig) = &self.config.kubeconfig {
            cmd = cmd.arg("--kubeconfig").arg(kubeconfig.to_string_lossy());
        }
        self.runner.run(&cmd).await
    }

    /// Install every non-skipped component in plan order.
    ///
    /// The plan is validated first; component names become directory names
    /// under `work_dir` that are removed and recreated.
    pub async fn apply(&self, plan: &BootstrapPlan) -> Result<()> {
        plan.validate()?;
        for component in &plan.components {
            if component.is_skipped() {
                info!(component = %component.name, "skipping component");
                continue;
            }
            self.apply_component(component)
                .await
                .map_err(|e| e.in_component(&component.name))?;
        }
        Ok(())
    }

    async fn apply_component(&self, component: &ComponentSpec) -> Result<()> {
        info!(component = %component.name, "installing component");
        let workdir = self.prepare_workdir(&component.name).await?;

        for hook in &component.pre_install_commands {
            self.runner
                .run(&hook.to_command()?.current_dir(&workdir))
                .await?;
        }

        if component.installs_from_package() {
            for release in &component.package_releases {
                info!(component = %component.name, release = %release.release_name, "installing package");
                self.runner.run(&helm::install_command(release)?).await?;
            }
        } else {
            self.build_from_source(component, &workdir).await?;
        }

        for hook in &component.post_install_commands {
            self.runner
                .run(&hook.to_command()?.current_dir(&workdir))
                .await?;
        }

        Ok(())
    }

    async fn build_from_source(&self, component: &ComponentSpec, workdir: &Path) -> Result<()> {
        let repo = &component.source_repo;
        if repo.url.is_empty() {
            return Err(BootstrapError::validation(
                "source-repo.url is required unless skip-local-build is set",
            ));
        }

        let checkout = git::checkout_path(workdir, repo);
        info!(component = %component.name, url = %repo.url, git_ref = %repo.git_ref, "fetching source");
        for cmd in git::clone_commands(repo, &checkout) {
            self.runner.run(&cmd).await?;
        }

        let build_dir = resolve_build_dir(&checkout, &component.build_directory)?;
        for cmd in make::build_commands(component, &build_dir)? {
            self.runner.run(&cmd).await?;
        }
        Ok(())
    }

    /// Remove and recreate `<work_dir>/<name>` so reruns start clean.
    async fn prepare_workdir(&self, name: &str) -> Result<PathBuf> {
        let workdir = self.config.work_dir.join(name);
        if self.config.dry_run {
            info!("[dry-run] recreate {}", workdir.display());
            return Ok(workdir);
        }

        match tokio::fs::remove_dir_all(&workdir).await {
            Ok(()) => debug!(path = %workdir.display(), "removed stale working directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(&workdir).await?;
        Ok(workdir)
    }

    async fn run_hooks(&self) -> Result<()> {
        for hook in &self.hooks {
            info!(hook = hook.name(), "running post-bootstrap hook");
            hook.run(self.runner.as_ref())
                .await
                .map_err(|e| e.in_hook(hook.name()))?;
        }
        Ok(())
    }
}

/// Join a build directory onto the checkout, refusing to escape it.
fn resolve_build_dir(checkout: &Path, build_directory: &str) -> Result<PathBuf> {
    if build_directory.is_empty() {
        return Ok(checkout.to_path_buf());
    }
    let relative = Path::new(build_directory);
    let contained = relative
        .components()
        .all(|c| matches!(c, PathComponent::Normal(_) | PathComponent::CurDir));
    if !contained {
        return Err(BootstrapError::validation(format!(
            "build-directory {:?} must be relative to the source checkout",
            build_directory
        )));
    }
    Ok(checkout.join(relative))
}

fn install_hint(tool: &str) -> String {
    match tool {
        "kind" => "Install it from https://kind.sigs.k8s.io/docs/user/quick-start/#installation".to_string(),
        "helm" => "Install it from https://helm.sh/docs/intro/install/".to_string(),
        "kubectl" => "Install it from https://kubernetes.io/docs/tasks/tools/".to_string(),
        "clusterctl" => {
            "Install it from https://cluster-api.sigs.k8s.io/user/quick-start#install-clusterctl"
                .to_string()
        }
        "git" | "make" => format!("Install {} with your system package manager", tool),
        other => format!("Make sure {} is on PATH", other),
    }
}
