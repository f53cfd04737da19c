//! Bootstrap planner for throwaway management clusters
//!
//! A [`BootstrapPlan`] lists the components to install on a fresh kind
//! cluster, each either from a package registry (helm) or built from source
//! (git + make). An optional JSON override document, usually supplied through
//! `TESTBED_PLAN_OVERRIDE`, is folded in with [`merge_plans`] before the
//! [`Planner`] applies the result in order.
//!
//! All external tools are driven through [`CommandRunner`] with structured
//! argument lists; nothing is interpreted by a shell.

pub mod error;
pub mod exec;
pub mod git;
pub mod helm;
pub mod hooks;
pub mod make;
pub mod merge;
pub mod plan;
pub mod planner;

pub use error::{BootstrapError, Result};
pub use exec::{CommandRunner, CommandSpec, DryRunRunner, EnvRunner, ProcessRunner};
pub use hooks::{EdgeNode, EdgeNodeHook, PostBootstrapHook};
pub use merge::merge_plans;
pub use plan::{
    load_plan, ArgLine, BootstrapPlan, ComponentSpec, PackageRelease, SourceRepo,
    PLAN_OVERRIDE_ENV,
};
pub use planner::{Planner, PlannerConfig, DEFAULT_CLUSTER_NAME};
