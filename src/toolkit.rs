//! Per-process context handed to every operation.

use anyhow::Result;
use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use crate::config::RootConfig;
use crate::exec::{CommandExecutor, SystemExecutor};
use crate::runtime::{ContainerRuntime, RuntimeProbe, SystemProbe};

/// Repository root, root configuration, command executor and the lazily
/// selected container runtime.
pub struct Toolkit {
    repo_root: PathBuf,
    config: RootConfig,
    executor: Box<dyn CommandExecutor>,
    probe: Box<dyn RuntimeProbe>,
    runtime: OnceCell<ContainerRuntime>,
}

impl Toolkit {
    pub fn new(repo_root: PathBuf, config: RootConfig) -> Self {
        Self {
            repo_root,
            config,
            executor: Box::new(SystemExecutor),
            probe: Box::new(SystemProbe),
            runtime: OnceCell::new(),
        }
    }

    /// Load `config.toml` from `repo_root`.
    pub fn open(repo_root: PathBuf) -> Result<Self> {
        let config = RootConfig::load(&repo_root)?;
        Ok(Self::new(repo_root, config))
    }

    pub fn with_executor(mut self, executor: Box<dyn CommandExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_probe(mut self, probe: Box<dyn RuntimeProbe>) -> Self {
        self.probe = probe;
        self.runtime = OnceCell::new();
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn config(&self) -> &RootConfig {
        &self.config
    }

    pub fn executor(&self) -> &dyn CommandExecutor {
        self.executor.as_ref()
    }

    /// The container runtime, detected on first use only.
    pub fn runtime(&self) -> Result<&ContainerRuntime> {
        if let Some(runtime) = self.runtime.get() {
            return Ok(runtime);
        }
        let detected = ContainerRuntime::detect(self.probe.as_ref())?;
        Ok(self.runtime.get_or_init(|| detected))
    }
}
