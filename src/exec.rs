//! External command execution.
//!
//! Everything the toolkit does outside its own process (container engine,
//! helper scripts) goes through [`CommandExecutor`], so the engine choice
//! stays swappable and tests can substitute a recording executor.

use anyhow::{Context, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::ToolkitError;

/// How the child's standard streams are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    /// Inherit stdin, stdout and stderr from the toolkit.
    Inherit,
    /// Discard all output; used for probes like `inspect`.
    Quiet,
}

/// A fully described command line, not yet run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub stdio: StdioMode,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            stdio: StdioMode::Inherit,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    pub fn quiet(mut self) -> Self {
        self.stdio = StdioMode::Quiet;
        self
    }

    /// Program followed by its arguments, as a single word list.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}

/// Outcome of a command that was successfully spawned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    code: Option<i32>,
}

impl CommandStatus {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn signaled() -> Self {
        Self { code: None }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Turn a non-zero status into a [`ToolkitError::CommandFailed`].
    pub fn check(self, spec: &CommandSpec) -> Result<()> {
        if self.success() {
            return Ok(());
        }
        Err(ToolkitError::CommandFailed {
            program: spec.program.clone(),
            code: self.code,
        }
        .into())
    }
}

/// Runs external commands to completion.
///
/// `Err` means the command could not be started at all; a command that ran
/// and failed is reported through [`CommandStatus`].
pub trait CommandExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<CommandStatus>;

    /// Run and require a zero exit code.
    fn execute_checked(&self, spec: &CommandSpec) -> Result<()> {
        self.execute(spec)?.check(spec)
    }
}

/// Spawns real processes with `std::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn execute(&self, spec: &CommandSpec) -> Result<CommandStatus> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.current_dir {
            cmd.current_dir(dir);
        }
        match spec.stdio {
            StdioMode::Inherit => {
                cmd.stdin(Stdio::inherit())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::inherit());
            }
            StdioMode::Quiet => {
                cmd.stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null());
            }
        }

        let status = cmd
            .status()
            .with_context(|| format!("Failed to execute '{}'", spec.program))?;
        Ok(match status.code() {
            Some(code) => CommandStatus::from_code(code),
            None => CommandStatus::signaled(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_program_and_args() {
        let spec = CommandSpec::new("sudo").args(["podman", "inspect", "demo/base:v1"]);
        assert_eq!(spec.to_string(), "sudo podman inspect demo/base:v1");
    }

    #[test]
    fn system_executor_reports_exit_codes() {
        let ok = CommandSpec::new("true").quiet();
        let ko = CommandSpec::new("false").quiet();
        assert!(SystemExecutor.execute(&ok).unwrap().success());
        assert_eq!(SystemExecutor.execute(&ko).unwrap().code(), Some(1));
    }

    #[test]
    fn system_executor_honours_working_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let spec = CommandSpec::new("sh")
            .args(["-c", "touch marker"])
            .current_dir(tmp.path())
            .quiet();
        SystemExecutor.execute_checked(&spec).unwrap();
        assert!(tmp.path().join("marker").is_file());
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let spec = CommandSpec::new("definitely_not_a_real_command_12345").quiet();
        assert!(SystemExecutor.execute(&spec).is_err());
    }

    #[test]
    fn check_maps_failure_to_command_failed() {
        let spec = CommandSpec::new("podman");
        let err = CommandStatus::from_code(125).check(&spec).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ToolkitError>(),
            Some(ToolkitError::CommandFailed {
                code: Some(125),
                ..
            })
        ));
    }
}
