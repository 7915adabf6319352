//! Tagged failure classes.
//!
//! Every fallible operation returns `anyhow::Result`; the variants below are
//! raised through it so callers that care about the class can
//! `downcast_ref::<ToolkitError>()`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolkitError {
    /// A configuration file is missing or unreadable.
    #[error("could not read '{}': {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration file is not valid TOML for its schema.
    #[error("could not parse '{}': {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A configuration file parsed but a mandatory value is empty.
    #[error("'{}' does not set required field '{field}'", path.display())]
    MissingField { path: PathBuf, field: &'static str },

    /// No repository root (a directory holding `.repo/`) above the start path.
    #[error("could not find the repository root above '{}'", start.display())]
    RepoRootNotFound { start: PathBuf },

    /// Neither podman nor docker is available.
    #[error("could not find either 'podman' or 'docker' in PATH")]
    EngineNotFound,

    /// An external command ran and exited unsuccessfully.
    #[error("'{program}' exited with {}", describe_code(*code))]
    CommandFailed { program: String, code: Option<i32> },

    /// Another invocation already holds the lock for this action.
    #[error("action '{action}' of '{recipe}' is already running (lock '{}')", lock.display())]
    ActionLocked {
        recipe: String,
        action: String,
        lock: PathBuf,
    },
}

fn describe_code(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}
