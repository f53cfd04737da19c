//! Plan override merging
//!
//! An override document is sparse: only the fields it sets take effect.
//! Components are matched by name; unknown names are appended after the base
//! components. Package releases accumulate rather than replace, so an override
//! can add a chart to an existing component without restating the others.

use tracing::debug;

use crate::plan::{BootstrapPlan, ComponentSpec};

/// Fold `overrides` into `base`.
///
/// Merging an empty override returns `base` unchanged.
pub fn merge_plans(base: BootstrapPlan, overrides: BootstrapPlan) -> BootstrapPlan {
    let mut merged = base;

    if !overrides.kind_cluster_config.is_empty() {
        merged.kind_cluster_config = overrides.kind_cluster_config;
    }

    for component in overrides.components {
        match merged
            .components
            .iter_mut()
            .find(|c| c.name == component.name)
        {
            Some(existing) => {
                debug!(component = %component.name, "applying override");
                merge_component(existing, component);
            }
            None => {
                debug!(component = %component.name, "appending component from override");
                merged.components.push(component);
            }
        }
    }

    merged
}

fn merge_component(base: &mut ComponentSpec, overrides: ComponentSpec) {
    if overrides.skip_component.is_some() {
        base.skip_component = overrides.skip_component;
    }
    if overrides.skip_local_build.is_some() {
        base.skip_local_build = overrides.skip_local_build;
    }

    replace_if_set(&mut base.pre_install_commands, overrides.pre_install_commands);
    replace_if_set(&mut base.post_install_commands, overrides.post_install_commands);
    replace_if_set(&mut base.build_variables, overrides.build_variables);
    replace_if_set(&mut base.build_targets, overrides.build_targets);

    base.package_releases.extend(overrides.package_releases);

    if !overrides.source_repo.url.is_empty() {
        base.source_repo.url = overrides.source_repo.url;
    }
    if !overrides.source_repo.git_ref.is_empty() {
        base.source_repo.git_ref = overrides.source_repo.git_ref;
    }
    if !overrides.build_directory.is_empty() {
        base.build_directory = overrides.build_directory;
    }
}

fn replace_if_set<T>(target: &mut Vec<T>, value: Vec<T>) {
    if !value.is_empty() {
        *target = value;
    }
}
