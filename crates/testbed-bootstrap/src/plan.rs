//! Bootstrap plan documents
//!
//! A plan is a YAML document naming the kind cluster topology and the ordered
//! list of components to install on it:
//!
//! ```yaml
//! kind-cluster-config: ./kind-config.yaml
//! components:
//!   - name: cluster-api-provider
//!     skip-local-build: true
//!     package-releases:
//!       - registry-url: oci://registry.example.com/charts
//!         release-name: capi-provider
//!         package-ref: capi-provider
//!         namespace: capi-system
//!   - name: cluster-manager
//!     source-repo: { url: https://github.com/example/cluster-manager, ref: main }
//!     build-variables: ["IMG_TAG=dev"]
//!     build-targets: [docker-build, kind-load, helm-install]
//! ```
//!
//! Override documents have the same shape, are supplied as JSON through an
//! environment variable, and are folded into the base plan by
//! [`merge_plans`](crate::merge_plans).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::exec::CommandSpec;
use crate::{BootstrapError, Result};

/// Default environment variable carrying the JSON override document
pub const PLAN_OVERRIDE_ENV: &str = "TESTBED_PLAN_OVERRIDE";

/// Version string meaning "whatever the registry considers newest"
const LATEST_VERSION: &str = "latest";

/// Root plan document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BootstrapPlan {
    /// Path to the kind cluster topology config
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind_cluster_config: String,

    /// Components in installation order
    #[serde(default)]
    pub components: Vec<ComponentSpec>,
}

/// One installable unit of the plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ComponentSpec {
    /// Unique key within the plan; also names the working directory
    pub name: String,

    /// Skip the component entirely. Unset means `false` in a base plan and
    /// "keep the base value" in an override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_component: Option<bool>,

    /// Install from `package-releases` instead of building from source.
    /// Same tri-state rules as `skip-component`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_local_build: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_install_commands: Vec<ArgLine>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_install_commands: Vec<ArgLine>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub package_releases: Vec<PackageRelease>,

    #[serde(default, skip_serializing_if = "SourceRepo::is_empty")]
    pub source_repo: SourceRepo,

    /// Build directory relative to the source checkout
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub build_directory: String,

    /// Ordered `KEY=VALUE` assignments handed to every build target
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_variables: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_targets: Vec<String>,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skip_component.unwrap_or(false)
    }

    /// True when the component installs from a package registry rather than
    /// from a source build.
    pub fn installs_from_package(&self) -> bool {
        self.skip_local_build.unwrap_or(false)
    }

    /// Split `build-variables` into ordered key/value pairs.
    pub fn build_variable_pairs(&self) -> Result<Vec<(String, String)>> {
        self.build_variables
            .iter()
            .map(|assignment| {
                assignment
                    .split_once('=')
                    .filter(|(key, _)| !key.is_empty())
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .ok_or_else(|| {
                        BootstrapError::validation(format!(
                            "component {}: build variable {:?} is not KEY=VALUE",
                            self.name, assignment
                        ))
                    })
            })
            .collect()
    }
}

/// A package-manager release to install
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageRelease {
    /// Chart repository URL, or an `oci://` registry prefix
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub registry_url: String,

    pub release_name: String,

    /// Chart name (or path below an OCI registry)
    pub package_ref: String,

    pub namespace: String,

    /// Explicit chart version; absent or `latest` installs the newest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Allow pre-release chart versions
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub use_development_channel: bool,

    /// Extra installer arguments such as `--set key=value`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_override_args: Option<ArgLine>,
}

impl PackageRelease {
    /// The version to pin, or `None` for the newest release.
    pub fn explicit_version(&self) -> Option<&str> {
        self.version
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case(LATEST_VERSION))
    }
}

/// Source repository of a build-from-source component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRepo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Branch, tag, or commit SHA
    #[serde(default, rename = "ref", skip_serializing_if = "String::is_empty")]
    pub git_ref: String,
}

impl SourceRepo {
    pub fn is_empty(&self) -> bool {
        self.url.is_empty() && self.git_ref.is_empty()
    }
}

/// An argument list written either as a list or as one shell-style line.
///
/// Lines are tokenized with POSIX shell-word rules (quotes are honored) but
/// never handed to a shell: no expansion, globbing, pipes or redirection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgLine {
    Line(String),
    Argv(Vec<String>),
}

impl ArgLine {
    pub fn to_args(&self) -> Result<Vec<String>> {
        match self {
            ArgLine::Argv(args) => Ok(args.clone()),
            ArgLine::Line(line) => shell_words::split(line).map_err(|e| {
                BootstrapError::validation(format!("cannot tokenize {:?}: {}", line, e))
            }),
        }
    }

    /// Interpret the arguments as a command; the first word is the program.
    pub fn to_command(&self) -> Result<CommandSpec> {
        CommandSpec::from_argv(&self.to_args()?)
    }
}

impl From<&str> for ArgLine {
    fn from(line: &str) -> Self {
        ArgLine::Line(line.to_string())
    }
}

/// Load and validate a plan document from disk.
pub fn load_plan(path: impl AsRef<Path>) -> Result<BootstrapPlan> {
    BootstrapPlan::load(path)
}

impl BootstrapPlan {
    /// Load and validate a YAML plan document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| BootstrapError::parse(path, format!("cannot read: {}", e)))?;
        let plan = Self::from_yaml_str(&content).map_err(|e| match e {
            BootstrapError::Parse { message, .. } => BootstrapError::parse(path, message),
            other => other,
        })?;
        Ok(plan.resolve_relative_to(path))
    }

    /// Parse and validate a YAML plan document.
    ///
    /// YAML is a superset of JSON, so this also accepts JSON documents.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let plan: BootstrapPlan = serde_yaml::from_str(content)
            .map_err(|e| BootstrapError::parse("<inline>", e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Parse and validate a JSON override document.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let plan: BootstrapPlan = serde_json::from_str(content)
            .map_err(|e| BootstrapError::parse("<override>", e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    /// Read an override document from an environment variable.
    ///
    /// Unset or blank variables mean "no override".
    pub fn override_from_env(var: &str) -> Result<Option<Self>> {
        match std::env::var(var) {
            Ok(value) if !value.trim().is_empty() => Self::from_json_str(&value)
                .map(Some)
                .map_err(|e| match e {
                    BootstrapError::Parse { message, .. } => {
                        BootstrapError::parse(format!("${}", var), message)
                    }
                    other => other,
                }),
            _ => Ok(None),
        }
    }

    /// Check structural invariants: unique, path-safe names and well-formed
    /// package releases and build variables.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for component in &self.components {
            validate_name(&component.name)?;
            if !seen.insert(component.name.as_str()) {
                return Err(BootstrapError::validation(format!(
                    "duplicate component name: {}",
                    component.name
                )));
            }

            for release in &component.package_releases {
                for (field, value) in [
                    ("release-name", &release.release_name),
                    ("package-ref", &release.package_ref),
                    ("namespace", &release.namespace),
                ] {
                    if value.trim().is_empty() {
                        return Err(BootstrapError::validation(format!(
                            "component {}: package release is missing {}",
                            component.name, field
                        )));
                    }
                }
            }

            component.build_variable_pairs()?;
        }
        Ok(())
    }

    pub fn component(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Components that will actually be installed, in order.
    pub fn active_components(&self) -> impl Iterator<Item = &ComponentSpec> {
        self.components.iter().filter(|c| !c.is_skipped())
    }

    /// Serialize back to YAML (used by `testbed plan`).
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| BootstrapError::validation(format!("cannot serialize plan: {}", e)))
    }

    /// Make a relative `kind-cluster-config` relative to the plan file.
    fn resolve_relative_to(mut self, plan_path: &Path) -> Self {
        if self.kind_cluster_config.is_empty() {
            return self;
        }
        let config = PathBuf::from(&self.kind_cluster_config);
        if config.is_relative() {
            if let Some(parent) = plan_path.parent() {
                self.kind_cluster_config = parent.join(config).to_string_lossy().into_owned();
            }
        }
        self
    }
}

/// Names become directory names under the work root, so keep them boring.
fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(BootstrapError::validation(format!(
            "invalid component name {:?}: use letters, digits, '-', '_' or '.'",
            name
        )))
    }
}
