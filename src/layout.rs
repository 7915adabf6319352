//! Host directory layout.
//!
//! ```text
//! <root>/config.toml
//! <root>/products/<product>/product.toml
//! <root>/products/<product>/<name>/{recipe,sdk}.toml
//! <root>/out/<short>/<version>/<recipe>/<action>/
//! <root>/cache/<short>/<version>/<recipe>/{<action>,binpkgs}/
//! <root>/cache/<short>/<version>/<recipe>/<action>.lock
//! <root>/assets/<dir>/
//! ```
//!
//! The whole tree is mounted at [`MOUNT_POINT`] inside SDK containers, so
//! every host path has a mirror under `/mnt`.
//!
//! The `.lock` files are held for the length of one container run and are
//! left in place afterwards; a concurrent run of the same action fails
//! instead of waiting.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ToolkitError;

/// Where the repository root appears inside containers.
pub const MOUNT_POINT: &str = "/mnt";

/// Marker directory identifying the repository root.
pub const REPO_MARKER: &str = ".repo";

pub const ROOT_CONFIG_FILE: &str = "config.toml";
pub const PRODUCT_CONFIG_FILE: &str = "product.toml";
pub const RECIPE_CONFIG_FILE: &str = "recipe.toml";
pub const SDK_CONFIG_FILE: &str = "sdk.toml";

/// Cache subdirectory shared by `bootstrap` and `build` for binary packages.
pub const BINPKGS_DIR: &str = "binpkgs";

/// Walk up from `start` until a directory containing `.repo/` is found.
pub fn find_repo_root(start: &Path) -> Result<PathBuf> {
    for candidate in start.ancestors() {
        if candidate.parent().is_none() {
            break;
        }
        if candidate.join(REPO_MARKER).is_dir() {
            return Ok(candidate.to_path_buf());
        }
    }
    Err(ToolkitError::RepoRootNotFound {
        start: start.to_path_buf(),
    }
    .into())
}

pub fn root_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(ROOT_CONFIG_FILE)
}

pub fn product_dir(repo_root: &Path, product: &str) -> PathBuf {
    repo_root.join("products").join(product)
}

pub fn product_config_path(repo_root: &Path, product: &str) -> PathBuf {
    product_dir(repo_root, product).join(PRODUCT_CONFIG_FILE)
}

pub fn recipe_config_path(repo_root: &Path, product: &str, recipe: &str) -> PathBuf {
    product_dir(repo_root, product)
        .join(recipe)
        .join(RECIPE_CONFIG_FILE)
}

pub fn sdk_config_path(repo_root: &Path, product: &str, sdk: &str) -> PathBuf {
    product_dir(repo_root, product).join(sdk).join(SDK_CONFIG_FILE)
}

/// Relative path of an action's `out` or `cache` tree.
pub fn action_subdir(kind: &str, short_name: &str, version: &str, recipe: &str, leaf: &str) -> PathBuf {
    [kind, short_name, version, recipe, leaf].iter().collect()
}

/// A directory living in the source tree, seen from both sides of the mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountedDir {
    pub host: PathBuf,
    pub container: PathBuf,
}

impl MountedDir {
    pub fn new(repo_root: &Path, relative: &Path) -> Self {
        Self {
            host: repo_root.join(relative),
            container: Path::new(MOUNT_POINT).join(relative),
        }
    }

    /// `--volume` value mounting this directory read-write.
    pub fn volume_rw(&self) -> String {
        format!("{}:{}:rw", self.host.display(), self.container.display())
    }
}

/// Remove `path` if it exists, then create it empty.
pub fn recreate_dir(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("removing previous output directory '{}'", path.display()))?;
    }
    ensure_dir(path)
}

/// `mkdir -p`.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("creating directory '{}'", path.display()))
}

/// Names of the SDKs defined for `product`.
pub fn list_sdks(repo_root: &Path, product: &str) -> Result<Vec<String>> {
    list_entries_with(repo_root, product, SDK_CONFIG_FILE)
}

/// Names of the recipes defined for `product`.
pub fn list_recipes(repo_root: &Path, product: &str) -> Result<Vec<String>> {
    list_entries_with(repo_root, product, RECIPE_CONFIG_FILE)
}

/// SDKs first, then recipes.
pub fn list_all(repo_root: &Path, product: &str) -> Result<Vec<String>> {
    let mut all = list_sdks(repo_root, product)?;
    all.extend(list_recipes(repo_root, product)?);
    Ok(all)
}

fn list_entries_with(repo_root: &Path, product: &str, marker: &str) -> Result<Vec<String>> {
    let dir = product_dir(repo_root, product);
    let entries = fs::read_dir(&dir)
        .with_context(|| format!("reading product directory '{}'", dir.display()))?;

    let mut names = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("reading entry under '{}'", dir.display()))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|part| part.to_str()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if !path.join(marker).is_file() {
            continue;
        }
        names.push(name.to_string());
    }

    names.sort();
    Ok(names)
}
