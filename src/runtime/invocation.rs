//! Construction and execution of a single `<engine> run` invocation.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

use super::lock::ActionLock;
use crate::config::RootConfig;
use crate::layout::{self, MountedDir, BINPKGS_DIR, MOUNT_POINT};
use crate::recipe::{Recipe, ACTION_BOOTSTRAP, ACTION_BUILD, ACTION_RUN};
use crate::sdk::Sdk;
use crate::Toolkit;

/// Name of the container running `action` for `unit` (a recipe or an SDK).
pub fn working_container_name(short_name: &str, unit: &str, action: &str) -> String {
    format!("{short_name}_{unit}.{action}.working")
}

/// Actions that get writable assets, the binpkgs cache and extra capabilities.
pub fn is_build_action(action: &str) -> bool {
    action == ACTION_BOOTSTRAP || action == ACTION_BUILD
}

/// Actions allowed network access when development networking is enabled.
pub fn may_use_network(action: &str) -> bool {
    action == ACTION_BOOTSTRAP || action == ACTION_BUILD || action == ACTION_RUN
}

/// `bootstrap` containers survive so they can be committed.
pub fn keeps_container(action: &str) -> bool {
    action == ACTION_BOOTSTRAP
}

pub struct RunInvocation<'a> {
    image: String,
    command: Vec<String>,
    action: &'a str,
    sdk: &'a Sdk,
    recipe: Option<&'a Recipe>,
}

impl<'a> RunInvocation<'a> {
    pub fn new(
        image: String,
        command: Vec<String>,
        action: &'a str,
        sdk: &'a Sdk,
        recipe: Option<&'a Recipe>,
    ) -> Self {
        Self {
            image,
            command,
            action,
            sdk,
            recipe,
        }
    }

    /// The recipe name, or the SDK name when running an SDK directly.
    pub fn unit_name(&self) -> &str {
        self.recipe.map_or(self.sdk.name.as_str(), |r| r.name.as_str())
    }

    pub fn container_name(&self) -> String {
        working_container_name(&self.sdk.product.short_name, self.unit_name(), self.action)
    }

    fn action_dir(&self, repo_root: &Path, kind: &str, leaf: &str) -> MountedDir {
        let product = &self.sdk.product;
        MountedDir::new(
            repo_root,
            &layout::action_subdir(
                kind,
                &product.short_name,
                &product.version,
                self.unit_name(),
                leaf,
            ),
        )
    }

    pub fn out_dir(&self, repo_root: &Path) -> MountedDir {
        self.action_dir(repo_root, "out", self.action)
    }

    pub fn cache_dir(&self, repo_root: &Path) -> MountedDir {
        self.action_dir(repo_root, "cache", self.action)
    }

    pub fn binpkgs_dir(&self, repo_root: &Path) -> MountedDir {
        self.action_dir(repo_root, "cache", BINPKGS_DIR)
    }

    fn asset_dirs(&self, repo_root: &Path) -> Vec<MountedDir> {
        self.sdk
            .build
            .writable_assets
            .iter()
            .map(|dir| MountedDir::new(repo_root, &Path::new("assets").join(dir)))
            .collect()
    }

    pub fn lock_path(&self, repo_root: &Path) -> PathBuf {
        let cache = self.cache_dir(repo_root).host;
        cache.with_file_name(format!("{}.lock", self.action))
    }

    /// Every `KEY=VALUE` pair passed with `--env`, in injection order.
    pub fn env(&self, config: &RootConfig) -> Vec<(String, String)> {
        let mut env = vec![
            ("DTK_ACTION".to_string(), self.action.to_string()),
            ("DTK_RECIPE".to_string(), self.unit_name().to_string()),
        ];
        // Instrumentation must not be baked into SDK images.
        if self.action != ACTION_BOOTSTRAP {
            env.extend(config.env());
        }
        env.extend(self.sdk.product.env(config));
        env.extend(self.sdk.env());
        if let Some(recipe) = self.recipe {
            env.extend(recipe.env());
        }
        env
    }

    /// Arguments following the engine program, starting with `run`.
    pub fn args(&self, repo_root: &Path, config: &RootConfig) -> Vec<String> {
        let product = &self.sdk.product;
        let mut args: Vec<String> = vec!["run".into()];

        // SELinux labels would block access to the home directory content.
        args.extend(["--security-opt".into(), "label=disable".into()]);

        args.extend(["--tty".into(), "--interactive".into()]);
        args.extend(["--tmpfs".into(), "/tmp:rw,exec,nodev,nosuid".into()]);
        args.extend(["--tmpfs".into(), "/var/tmp:rw,exec,dev,suid".into()]);

        let workdir = Path::new(MOUNT_POINT)
            .join("products")
            .join(&product.name)
            .join(&self.sdk.name);
        args.extend(["--workdir".into(), workdir.display().to_string()]);

        args.extend(["--name".into(), self.container_name()]);
        args.extend([
            "--hostname".into(),
            format!("{}-{}", product.short_name, self.unit_name()),
        ]);

        for (key, value) in self.env(config) {
            args.extend(["--env".into(), format!("{key}={value}")]);
        }

        let source_mode = if self.action == ACTION_RUN { "rw" } else { "ro" };
        args.extend([
            "--volume".into(),
            format!("{}:{MOUNT_POINT}:{source_mode}", repo_root.display()),
        ]);

        for dir in [self.out_dir(repo_root), self.cache_dir(repo_root)] {
            args.extend(["--volume".into(), dir.volume_rw()]);
        }

        if is_build_action(self.action) {
            for dir in self.asset_dirs(repo_root) {
                args.extend(["--volume".into(), dir.volume_rw()]);
            }
            args.extend(["--volume".into(), self.binpkgs_dir(repo_root).volume_rw()]);
            for cap in &self.sdk.build.capabilities {
                args.extend(["--cap-add".into(), cap.clone()]);
            }
        }

        if !(config.network_enabled() && may_use_network(self.action)) {
            args.push("--network=none".into());
        }

        if !keeps_container(self.action) {
            args.push("--rm".into());
        }

        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }

    /// Purge `out`, create `cache` (and build-only directories) on the host.
    pub fn prepare_host_dirs(&self, repo_root: &Path) -> Result<()> {
        layout::recreate_dir(&self.out_dir(repo_root).host)?;
        layout::ensure_dir(&self.cache_dir(repo_root).host)?;
        if is_build_action(self.action) {
            for dir in self.asset_dirs(repo_root) {
                layout::ensure_dir(&dir.host)?;
            }
            layout::ensure_dir(&self.binpkgs_dir(repo_root).host)?;
        }
        Ok(())
    }

    /// Run the container to completion.
    pub fn execute(&self, toolkit: &Toolkit) -> Result<()> {
        let repo_root = toolkit.repo_root();
        let runtime = toolkit.runtime()?;
        let _lock = ActionLock::acquire(&self.lock_path(repo_root), self.unit_name(), self.action)?;

        self.prepare_host_dirs(repo_root)?;

        let spec = runtime.command(self.args(repo_root, toolkit.config()));
        debug!("Will run: {spec}");

        let result = toolkit.executor().execute_checked(&spec);
        if let Err(err) = &result {
            error!("SDK exited with error: {err:#}");
        }
        result
    }
}
