//! CLI commands

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use testbed_bootstrap::{merge_plans, BootstrapPlan, PLAN_OVERRIDE_ENV};
use testbed_identity::provider::default_cache_path;
use testbed_identity::{
    FileKeyProvider, IssuerConfig, TestIdentity, DEFAULT_ISSUER_URL, ISSUER_URL_ENV,
    KEY_CACHE_ENV,
};

use crate::Result;

pub mod bootstrap;
pub mod identity;
pub mod plan;
pub mod teardown;
pub mod token;

/// Where the plan comes from: a base document plus an optional JSON override
#[derive(Args, Debug, Clone)]
pub struct PlanSource {
    /// Base plan document (YAML or JSON)
    #[arg(long, env = "TESTBED_PLAN", default_value = "bootstrap.yaml")]
    pub plan: PathBuf,

    /// JSON document merged over the base plan
    #[arg(long = "override", env = PLAN_OVERRIDE_ENV)]
    pub override_json: Option<String>,
}

impl PlanSource {
    /// Load the base plan and merge the override over it
    pub fn load(&self) -> Result<BootstrapPlan> {
        let base = BootstrapPlan::load(&self.plan)?;
        let merged = match self.override_json.as_deref().map(str::trim) {
            Some(json) if !json.is_empty() => {
                info!(plan = %self.plan.display(), "applying plan override");
                merge_plans(base, BootstrapPlan::from_json_str(json)?)
            }
            _ => base,
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Which signing key and issuer URL to use
#[derive(Args, Debug, Clone, Default)]
pub struct IssuerSource {
    /// Issuer URL placed in `iss` and the discovery document
    #[arg(long, env = ISSUER_URL_ENV)]
    pub issuer_url: Option<String>,

    /// Signing key cache shared by every process of a test run
    #[arg(long, env = KEY_CACHE_ENV)]
    pub key_cache: Option<PathBuf>,
}

impl IssuerSource {
    /// The issuer every other process of the run agrees with
    pub fn identity(&self) -> Result<TestIdentity> {
        self.identity_or(DEFAULT_ISSUER_URL)
    }

    /// Like [`IssuerSource::identity`], with `fallback_url` used when no
    /// issuer URL was given
    pub fn identity_or(&self, fallback_url: &str) -> Result<TestIdentity> {
        let provider = FileKeyProvider::new(
            self.key_cache.clone().unwrap_or_else(default_cache_path),
        );
        let url = match self.issuer_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url,
            _ => fallback_url,
        };
        let config = IssuerConfig::default().with_issuer_url(url);
        Ok(TestIdentity::from_provider(&provider, config)?)
    }
}
