//! Source checkout commands

use std::path::{Path, PathBuf};

use crate::exec::CommandSpec;
use crate::plan::SourceRepo;

/// Shortest abbreviated SHA accepted as a commit reference
const MIN_SHA_LEN: usize = 5;
/// Length of a full SHA-1 object name
const MAX_SHA_LEN: usize = 40;

/// Whether a ref looks like an (abbreviated) commit SHA rather than a branch or tag.
pub fn is_commit_hash(git_ref: &str) -> bool {
    (MIN_SHA_LEN..=MAX_SHA_LEN).contains(&git_ref.len())
        && git_ref
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

/// Directory name for a checkout: last URL segment without `.git`.
pub fn checkout_dir_name(url: &str) -> &str {
    let last = url
        .trim_end_matches('/')
        .rsplit(|c: char| c == '/' || c == ':')
        .next()
        .unwrap_or(url);
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        "source"
    } else {
        name
    }
}

/// Where `repo` is checked out inside a component working directory.
pub fn checkout_path(workdir: &Path, repo: &SourceRepo) -> PathBuf {
    workdir.join(checkout_dir_name(&repo.url))
}

/// Commands that fetch `repo` into `dest`.
///
/// Branches and tags use a shallow single-branch clone. A commit SHA cannot be
/// fetched shallowly by name, so it gets a full clone followed by a checkout.
pub fn clone_commands(repo: &SourceRepo, dest: &Path) -> Vec<CommandSpec> {
    let dest_str = dest.to_string_lossy().into_owned();

    if is_commit_hash(&repo.git_ref) {
        return vec![
            CommandSpec::new("git").args(["clone", repo.url.as_str(), dest_str.as_str()]),
            CommandSpec::new("git")
                .args(["checkout", repo.git_ref.as_str()])
                .current_dir(dest),
        ];
    }

    let mut clone = CommandSpec::new("git").args(["clone", "--depth", "1"]);
    if !repo.git_ref.is_empty() {
        clone = clone.args(["--branch", repo.git_ref.as_str()]);
    }
    vec![clone.args([repo.url.as_str(), dest_str.as_str()])]
}
