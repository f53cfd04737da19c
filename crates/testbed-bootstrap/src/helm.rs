//! Package release install commands

use crate::exec::CommandSpec;
use crate::plan::PackageRelease;
use crate::Result;

const OCI_SCHEME: &str = "oci://";

/// Build the `helm install` command for a release.
///
/// Classic chart repositories are passed with `--repo`; OCI registries are
/// addressed by prefixing the chart reference instead.
pub fn install_command(release: &PackageRelease) -> Result<CommandSpec> {
    let registry = release.registry_url.trim_end_matches('/');
    let chart = if registry.starts_with(OCI_SCHEME) {
        format!("{}/{}", registry, release.package_ref)
    } else {
        release.package_ref.clone()
    };

    let mut cmd = CommandSpec::new("helm").args([
        "install",
        release.release_name.as_str(),
        chart.as_str(),
        "--namespace",
        release.namespace.as_str(),
        "--create-namespace",
    ]);

    if !registry.is_empty() && !registry.starts_with(OCI_SCHEME) {
        cmd = cmd.args(["--repo", registry]);
    }
    if let Some(version) = release.explicit_version() {
        cmd = cmd.args(["--version", version]);
    }
    if release.use_development_channel {
        cmd = cmd.arg("--devel");
    }
    if let Some(extra) = &release.extra_override_args {
        cmd = cmd.args(extra.to_args()?);
    }

    Ok(cmd)
}
