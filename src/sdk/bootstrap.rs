//! SDK image bootstrap.
//!
//! ```text
//! Absent ──► CiCached                       (terminal)
//!    │  └──► LocalCached                    (terminal)
//!    └─────► RootfsImported ──► ContainerCommitted ──► Tagged (terminal)
//! ```
//!
//! `RootfsImported` is reached either by importing the rootfs archive as
//! `<tag>.bootstrap` or by finding that intermediate image already present.
//! Nothing is rolled back on failure: an imported intermediate image or a
//! committed final image stays in the engine's store.

use anyhow::{Context, Result};
use std::fmt;
use tracing::{debug, info};

use super::{Sdk, BOOTSTRAP_SCRIPT};
use crate::recipe::ACTION_BOOTSTRAP;
use crate::runtime::invocation::{working_container_name, RunInvocation};
use crate::runtime::ContainerRuntime;
use crate::Toolkit;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    /// Nothing checked yet.
    Absent,
    /// Final image found in (or pulled from) the CI registry.
    CiCached,
    /// Final image found in the local store.
    LocalCached,
    /// `<tag>.bootstrap` intermediate image available locally.
    RootfsImported,
    /// Bootstrap script ran and its container was committed to the final tag.
    ContainerCommitted,
    /// Working container removed; the final image is ready.
    Tagged,
}

impl BootstrapState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BootstrapState::CiCached | BootstrapState::LocalCached | BootstrapState::Tagged
        )
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapState::Absent => "absent",
            BootstrapState::CiCached => "ci-cached",
            BootstrapState::LocalCached => "local-cached",
            BootstrapState::RootfsImported => "bootstrap-rootfs-imported",
            BootstrapState::ContainerCommitted => "bootstrap-container-committed",
            BootstrapState::Tagged => "tagged",
        };
        f.write_str(name)
    }
}

pub struct Bootstrapper<'a> {
    toolkit: &'a Toolkit,
    sdk: &'a Sdk,
    runtime: ContainerRuntime,
}

impl<'a> Bootstrapper<'a> {
    pub fn new(toolkit: &'a Toolkit, sdk: &'a Sdk) -> Result<Self> {
        let runtime = *toolkit.runtime()?;
        Ok(Self {
            toolkit,
            sdk,
            runtime,
        })
    }

    /// Drive the machine to a terminal state and return every state visited.
    pub fn run(&self) -> Result<Vec<BootstrapState>> {
        debug!("Bootstrapping '{}'", self.sdk.image_ref());
        let mut history = vec![BootstrapState::Absent];
        let mut state = BootstrapState::Absent;
        while !state.is_terminal() {
            state = self
                .step(state)
                .with_context(|| format!("bootstrapping SDK '{}'", self.sdk.image_ref()))?;
            debug!("SDK '{}' is now {state}", self.sdk.name);
            history.push(state);
        }
        Ok(history)
    }

    fn step(&self, state: BootstrapState) -> Result<BootstrapState> {
        match state {
            BootstrapState::Absent => self.lookup_or_import(),
            BootstrapState::RootfsImported => self.run_and_commit(),
            BootstrapState::ContainerCommitted => self.cleanup(),
            terminal => Ok(terminal),
        }
    }

    fn working_container(&self) -> String {
        working_container_name(&self.sdk.product.short_name, &self.sdk.name, ACTION_BOOTSTRAP)
    }

    fn lookup_or_import(&self) -> Result<BootstrapState> {
        let executor = self.toolkit.executor();
        let name = self.sdk.image_name();

        if let Some(registry) = self.toolkit.config().ci_registry() {
            if self
                .runtime
                .find_ci_image(executor, registry, &name, &self.sdk.tag)
            {
                debug!("No need to bootstrap '{}'", self.sdk.image_ref());
                return Ok(BootstrapState::CiCached);
            }
        }

        if self
            .runtime
            .find_local_image(executor, &name, &self.sdk.tag)?
        {
            debug!("No need to bootstrap '{}'", self.sdk.image_ref());
            return Ok(BootstrapState::LocalCached);
        }

        info!(
            "No image found. Bootstrapping image '{}' from scratch",
            self.sdk.image_ref()
        );

        if !self
            .runtime
            .find_local_image(executor, &name, &self.sdk.bootstrap_tag())?
        {
            let rootfs = self.toolkit.repo_root().join(&self.sdk.bootstrap.rootfs);
            info!("Importing rootfs from '{}'", self.sdk.bootstrap.rootfs);
            self.runtime
                .import_rootfs(executor, &rootfs, &self.sdk.bootstrap_ref())?;
        }

        Ok(BootstrapState::RootfsImported)
    }

    fn run_and_commit(&self) -> Result<BootstrapState> {
        let executor = self.toolkit.executor();
        let container = self.working_container();

        debug!("Removing temporary container '{container}'");
        if let Err(err) = self.runtime.remove_container(executor, &container) {
            debug!("Could not remove temporary container '{container}': {err:#}");
        }

        info!("Running bootstrap step for '{}'", self.sdk.bootstrap_ref());
        RunInvocation::new(
            self.sdk.bootstrap_ref(),
            vec![BOOTSTRAP_SCRIPT.to_string()],
            ACTION_BOOTSTRAP,
            self.sdk,
            None,
        )
        .execute(self.toolkit)?;

        info!("Committing final image '{}'", self.sdk.image_ref());
        self.runtime
            .commit(executor, &container, &self.sdk.image_ref())?;
        info!("Successfully committed final image '{}'", self.sdk.image_ref());

        Ok(BootstrapState::ContainerCommitted)
    }

    fn cleanup(&self) -> Result<BootstrapState> {
        let container = self.working_container();
        info!("Removing temporary container '{container}'");
        self.runtime
            .remove_container(self.toolkit.executor(), &container)?;
        Ok(BootstrapState::Tagged)
    }
}
