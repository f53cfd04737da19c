//! Local build commands

use std::path::Path;

use crate::exec::CommandSpec;
use crate::plan::ComponentSpec;
use crate::Result;

/// One `make` invocation per build target, in order.
///
/// Build variables are passed both as make overrides (`KEY=VALUE` arguments)
/// and as environment variables, so recipes that shell out to scripts see
/// them too.
pub fn build_commands(component: &ComponentSpec, build_dir: &Path) -> Result<Vec<CommandSpec>> {
    let variables = component.build_variable_pairs()?;

    Ok(component
        .build_targets
        .iter()
        .map(|target| {
            let mut cmd = CommandSpec::new("make").current_dir(build_dir);
            for (key, value) in &variables {
                cmd = cmd.env(key, value).arg(format!("{}={}", key, value));
            }
            cmd.arg(target)
        })
        .collect())
}
