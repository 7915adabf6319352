use std::path::PathBuf;

use anyhow::{Context, Result};
use distro_toolkit::layout::find_repo_root;
use distro_toolkit::Toolkit;

/// Overrides the upward `.repo/` search.
const REPO_ROOT_ENV: &str = "DTK_REPO_ROOT";

pub(crate) fn locate_repo_root() -> Result<PathBuf> {
    if let Some(root) = std::env::var_os(REPO_ROOT_ENV) {
        return Ok(PathBuf::from(root));
    }
    let cwd = std::env::current_dir().context("resolving current directory")?;
    find_repo_root(&cwd)
}

pub(crate) fn open_toolkit() -> Result<Toolkit> {
    let repo_root = locate_repo_root()?;
    Toolkit::open(repo_root).context("loading root configuration")
}
