//! Advisory lock held for the duration of one container invocation.
//!
//! Two invocations on the same `(product, version, recipe, action)` would
//! purge and write the same `out` tree; the second one fails fast instead.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use crate::error::ToolkitError;

#[derive(Debug)]
pub struct ActionLock {
    file: File,
    path: PathBuf,
}

impl ActionLock {
    pub fn acquire(path: &Path, recipe: &str, action: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating lock directory '{}'", parent.display()))?;
        }

        // Never unlink the lock file: a second process could then create a
        // fresh file at the same path and lock it while we still hold ours.
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("Failed to create lock file: {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            return Err(ToolkitError::ActionLocked {
                recipe: recipe.to_string(),
                action: action.to_string(),
                lock: path.to_path_buf(),
            }
            .into());
        }

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ActionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
