//! Container engine selection and image lifecycle.
//!
//! Selection order:
//! 1. `podman` in PATH, rootless when the current user has a subordinate UID
//!    range in `/etc/subuid`, otherwise through `sudo`
//! 2. `docker` in PATH, through `sudo`
//!
//! Anything else is fatal. The result is memoized by
//! [`Toolkit::runtime`](crate::Toolkit::runtime).

pub mod invocation;
pub mod lock;

use anyhow::{Context, Result};
use nix::unistd::{getuid, User};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::ToolkitError;
use crate::exec::{CommandExecutor, CommandSpec};

pub const SUBUID_PATH: &str = "/etc/subuid";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Podman,
    Docker,
}

impl Engine {
    pub fn program(&self) -> &'static str {
        match self {
            Engine::Podman => "podman",
            Engine::Docker => "docker",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Host facts the selection depends on.
pub trait RuntimeProbe {
    /// Absolute path of `program` if it is in PATH.
    fn find_program(&self, program: &str) -> Option<PathBuf>;

    /// Login name of the user running the toolkit.
    fn current_username(&self) -> Option<String>;

    /// Content of the subordinate UID table, if readable.
    fn subuid_table(&self) -> Option<String>;
}

/// Probes the real host.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl RuntimeProbe for SystemProbe {
    fn find_program(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    fn current_username(&self) -> Option<String> {
        match User::from_uid(getuid()) {
            Ok(user) => user.map(|user| user.name),
            Err(err) => {
                debug!("Could not resolve the current user: {err}");
                None
            }
        }
    }

    fn subuid_table(&self) -> Option<String> {
        fs::read_to_string(SUBUID_PATH).ok()
    }
}

/// Whether `table` (in `/etc/subuid` format) has an entry for `username`.
pub fn has_subuid_entry(table: &str, username: &str) -> bool {
    table
        .lines()
        .filter_map(|line| line.split(':').next())
        .any(|name| name == username)
}

/// The selected engine and whether it must be run through `sudo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerRuntime {
    pub engine: Engine,
    pub sudo: bool,
}

impl ContainerRuntime {
    pub fn detect(probe: &dyn RuntimeProbe) -> Result<Self> {
        if let Some(path) = probe.find_program(Engine::Podman.program()) {
            debug!("Found 'podman' at {}", path.display());
            let rootless = match (probe.current_username(), probe.subuid_table()) {
                (Some(username), Some(table)) => has_subuid_entry(&table, &username),
                _ => false,
            };
            if !rootless {
                debug!("No subordinate UIDs configured for the current user; using sudo");
            }
            return Ok(Self {
                engine: Engine::Podman,
                sudo: !rootless,
            });
        }

        if let Some(path) = probe.find_program(Engine::Docker.program()) {
            debug!("Found 'docker' at {}", path.display());
            return Ok(Self {
                engine: Engine::Docker,
                sudo: true,
            });
        }

        Err(ToolkitError::EngineNotFound.into())
    }

    /// An engine command line, elevated through `sudo` when required.
    pub fn command<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let spec = if self.sudo {
            CommandSpec::new("sudo").arg(self.engine.program())
        } else {
            CommandSpec::new(self.engine.program())
        };
        spec.args(args)
    }

    /// `inspect` the image quietly; a non-zero exit means it is absent.
    pub fn image_exists(&self, executor: &dyn CommandExecutor, image: &str) -> Result<bool> {
        let spec = self.command(["inspect", image]).quiet();
        let status = executor
            .execute(&spec)
            .with_context(|| format!("inspecting image '{image}'"))?;
        Ok(status.success())
    }

    /// Look for `<registry>/<name>:<tag>` locally, pulling it if needed, and
    /// tag it as `<name>:<tag>` so actions can run it by its short reference.
    ///
    /// Every failure, including an unreachable registry, counts as "not
    /// found" so the caller falls back to a local build.
    pub fn find_ci_image(
        &self,
        executor: &dyn CommandExecutor,
        registry: &str,
        name: &str,
        tag: &str,
    ) -> bool {
        let image = format!("{registry}/{name}:{tag}");
        if !self.fetch_ci_image(executor, &image, registry, name, tag) {
            return false;
        }

        let local = format!("{name}:{tag}");
        match self.tag(executor, &image, &local) {
            Ok(()) => true,
            Err(err) => {
                warn!("Could not tag '{image}' as '{local}': {err:#}");
                false
            }
        }
    }

    fn fetch_ci_image(
        &self,
        executor: &dyn CommandExecutor,
        image: &str,
        registry: &str,
        name: &str,
        tag: &str,
    ) -> bool {
        debug!("Looking for image '{image}' in local registry");
        match self.image_exists(executor, image) {
            Ok(true) => {
                debug!("Found image '{image}' in local registry");
                return true;
            }
            Ok(false) => info!("Could not find image '{image}' in local registry"),
            Err(err) => warn!("Could not inspect image '{image}': {err:#}"),
        }

        info!("Pulling image '{name}:{tag}' from '{registry}'");
        match self.pull(executor, image) {
            Ok(()) => {
                info!("Pulled image '{name}:{tag}' from '{registry}'");
                true
            }
            Err(err) => {
                warn!("Could not pull '{name}:{tag}' from '{registry}': {err:#}");
                false
            }
        }
    }

    /// Look for `localhost/<name>:<tag>`.
    pub fn find_local_image(
        &self,
        executor: &dyn CommandExecutor,
        name: &str,
        tag: &str,
    ) -> Result<bool> {
        let image = format!("localhost/{name}:{tag}");
        debug!("Looking for image '{image}' in local registry");
        let found = self.image_exists(executor, &image)?;
        if found {
            debug!("Found image '{image}' in local registry");
        } else {
            debug!("Could not find image '{image}' in local registry");
        }
        Ok(found)
    }

    pub fn pull(&self, executor: &dyn CommandExecutor, image: &str) -> Result<()> {
        executor.execute_checked(&self.command(["pull", image]))
    }

    pub fn tag(&self, executor: &dyn CommandExecutor, source: &str, target: &str) -> Result<()> {
        executor
            .execute_checked(&self.command(["tag", source, target]))
            .with_context(|| format!("tagging '{source}' as '{target}'"))
    }

    /// Create `image` from a root filesystem archive.
    pub fn import_rootfs(
        &self,
        executor: &dyn CommandExecutor,
        rootfs: &Path,
        image: &str,
    ) -> Result<()> {
        let rootfs_arg = rootfs.display().to_string();
        executor
            .execute_checked(&self.command(["import", rootfs_arg.as_str(), image]))
            .with_context(|| format!("importing rootfs '{}' as '{image}'", rootfs.display()))
    }

    pub fn commit(&self, executor: &dyn CommandExecutor, container: &str, image: &str) -> Result<()> {
        executor
            .execute_checked(&self.command(["commit", container, image]))
            .with_context(|| format!("committing container '{container}' to '{image}'"))
    }

    pub fn remove_container(&self, executor: &dyn CommandExecutor, container: &str) -> Result<()> {
        executor
            .execute_checked(&self.command(["rm", container]).quiet())
            .with_context(|| format!("removing container '{container}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeProbe {
        programs: Vec<&'static str>,
        username: Option<&'static str>,
        subuid: Option<&'static str>,
    }

    impl RuntimeProbe for FakeProbe {
        fn find_program(&self, program: &str) -> Option<PathBuf> {
            self.programs
                .contains(&program)
                .then(|| PathBuf::from("/usr/bin").join(program))
        }

        fn current_username(&self) -> Option<String> {
            self.username.map(str::to_string)
        }

        fn subuid_table(&self) -> Option<String> {
            self.subuid.map(str::to_string)
        }
    }

    #[test]
    fn system_username_follows_the_uid_not_the_environment() {
        let owner = User::from_uid(getuid()).unwrap().map(|user| user.name);
        std::env::set_var("USER", "not-the-process-owner");
        std::env::set_var("LOGNAME", "not-the-process-owner");
        assert_eq!(SystemProbe.current_username(), owner);
    }

    #[test]
    fn subuid_entry_matches_whole_username() {
        let table = "root:100000:65536\nalice:165536:65536\n";
        assert!(has_subuid_entry(table, "alice"));
        assert!(!has_subuid_entry(table, "ali"));
        assert!(!has_subuid_entry(table, "bob"));
    }

    #[test]
    fn rootless_podman_when_subuids_configured() {
        let probe = FakeProbe {
            programs: vec!["podman", "docker"],
            username: Some("alice"),
            subuid: Some("alice:100000:65536\n"),
        };
        let runtime = ContainerRuntime::detect(&probe).unwrap();
        assert_eq!(
            runtime,
            ContainerRuntime {
                engine: Engine::Podman,
                sudo: false
            }
        );
        assert_eq!(runtime.command(["images"]).to_string(), "podman images");
    }

    #[test]
    fn privileged_podman_without_subuids() {
        let probe = FakeProbe {
            programs: vec!["podman"],
            username: Some("alice"),
            subuid: Some("bob:100000:65536\n"),
        };
        let runtime = ContainerRuntime::detect(&probe).unwrap();
        assert_eq!(runtime.engine, Engine::Podman);
        assert!(runtime.sudo);
        assert_eq!(runtime.command(["images"]).to_string(), "sudo podman images");
    }

    #[test]
    fn privileged_podman_when_subuid_file_unreadable() {
        let probe = FakeProbe {
            programs: vec!["podman"],
            username: Some("alice"),
            subuid: None,
        };
        assert!(ContainerRuntime::detect(&probe).unwrap().sudo);
    }

    #[test]
    fn docker_fallback_is_always_privileged() {
        let probe = FakeProbe {
            programs: vec!["docker"],
            username: Some("alice"),
            subuid: Some("alice:100000:65536\n"),
        };
        let runtime = ContainerRuntime::detect(&probe).unwrap();
        assert_eq!(runtime.engine, Engine::Docker);
        assert!(runtime.sudo);
    }

    #[test]
    fn no_engine_is_fatal() {
        let probe = FakeProbe {
            programs: vec![],
            username: None,
            subuid: None,
        };
        let err = ContainerRuntime::detect(&probe).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ToolkitError>(),
            Some(ToolkitError::EngineNotFound)
        ));
    }
}
