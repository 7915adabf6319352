//! Build orchestration for an OS distribution made of products, recipes and
//! SDK container images.
//!
//! A **product** lists recipes; each **recipe** runs its actions (`build`,
//! `image`, `configure`, `bundle`) inside a container created from exactly one
//! **SDK** image, which is bootstrapped from a root filesystem archive the
//! first time it is needed.
//!
//! # Architecture
//!
//! ```text
//! config.toml ──► RootConfig ─┐
//!                             ├──► Toolkit ──► ContainerRuntime (podman/docker, once)
//! repo root (.repo/) ─────────┘        │
//!                                      ├──► Product ──► Recipe ──► Sdk
//!                                      │                  │         │
//!                                      │                  │         └── Bootstrapper
//!                                      │                  └──────────── RunInvocation
//!                                      └──► CommandExecutor (every external command)
//! ```
//!
//! Everything runs sequentially and stops at the first error.
//!
//! # Example
//!
//! ```rust,ignore
//! use distro_toolkit::{Recipe, Toolkit};
//!
//! let toolkit = Toolkit::open(repo_root)?;
//! let recipe = Recipe::load(&toolkit, "core")?;
//! recipe.action(&toolkit, "build")?;
//! ```

pub mod ci;
pub mod config;
pub mod error;
pub mod exec;
pub mod layout;
pub mod product;
pub mod recipe;
pub mod runtime;
pub mod sdk;
pub mod testbed;
mod toolkit;

pub use config::RootConfig;
pub use error::ToolkitError;
pub use exec::{CommandExecutor, CommandSpec, CommandStatus, SystemExecutor};
pub use product::Product;
pub use recipe::Recipe;
pub use runtime::{ContainerRuntime, Engine, RuntimeProbe};
pub use sdk::{BootstrapState, Sdk};
pub use toolkit::Toolkit;
