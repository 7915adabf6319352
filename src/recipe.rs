//! Recipes: build units bound to exactly one SDK.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::config::{read_toml, require_field};
use crate::layout::{self, MOUNT_POINT};
use crate::product::Product;
use crate::runtime::invocation::RunInvocation;
use crate::sdk::Sdk;
use crate::Toolkit;

pub const ACTION_BOOTSTRAP: &str = "bootstrap";
pub const ACTION_BUILD: &str = "build";
pub const ACTION_IMAGE: &str = "image";
pub const ACTION_CONFIGURE: &str = "configure";
pub const ACTION_BUNDLE: &str = "bundle";
pub const ACTION_RUN: &str = "run";

/// Command used by `run` when none is given.
pub const DEFAULT_RUN_COMMAND: &str = "bash";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub name: String,
    pub actions: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub sdk: Sdk,
    pub product: Product,
}

#[derive(Debug, Deserialize)]
struct RecipeToml {
    #[serde(default)]
    sdk: String,
    #[serde(default)]
    actions: Vec<String>,
    #[serde(default)]
    environment: BTreeMap<String, String>,
}

impl Recipe {
    /// Load `products/<product>/<name>/recipe.toml` and the SDK it names.
    /// `name` may carry the product short name as a prefix.
    pub fn load(toolkit: &Toolkit, name: &str) -> Result<Self> {
        let product = Product::load(toolkit)?;
        let name = product.strip_prefix(name).to_string();
        let path = layout::recipe_config_path(toolkit.repo_root(), &product.name, &name);
        let parsed: RecipeToml = read_toml(&path)?;
        require_field(&path, "sdk", &parsed.sdk)?;

        let sdk = Sdk::load_for(toolkit, product.clone(), &parsed.sdk)
            .with_context(|| format!("resolving SDK '{}' of recipe '{name}'", parsed.sdk))?;

        Ok(Self {
            name,
            actions: parsed.actions,
            environment: parsed.environment,
            sdk,
            product,
        })
    }

    pub fn env(&self) -> Vec<(String, String)> {
        self.environment
            .iter()
            .map(|(k, v)| (format!("DTK_RECIPE_ENV_{k}"), v.clone()))
            .collect()
    }

    /// Script run for `action`: the recipe's own `<action>.sh` when present,
    /// otherwise the SDK's default one from its working directory.
    pub fn action_command(&self, repo_root: &Path, action: &str) -> Result<String> {
        let script = format!("{action}.sh");
        let relative = Path::new("products")
            .join(&self.product.name)
            .join(&self.name)
            .join(&script);
        let host = repo_root.join(&relative);
        match host.try_exists() {
            Ok(true) => Ok(Path::new(MOUNT_POINT).join(relative).display().to_string()),
            Ok(false) => Ok(format!("./{script}")),
            Err(err) => Err(err).with_context(|| format!("accessing '{}'", host.display())),
        }
    }

    /// Bootstrap the SDK if needed, then run one action.
    pub fn action(&self, toolkit: &Toolkit, action: &str) -> Result<()> {
        self.sdk.ensure_bootstrapped(toolkit)?;
        let command = self.action_command(toolkit.repo_root(), action)?;
        info!("Running action '{action}' of recipe '{}'", self.name);
        RunInvocation::new(
            self.sdk.image_ref(),
            vec![command],
            action,
            &self.sdk,
            Some(self),
        )
        .execute(toolkit)
        .with_context(|| format!("running action '{action}' of recipe '{}'", self.name))
    }

    /// Bootstrap the SDK, then every declared action in order.
    pub fn all_actions(&self, toolkit: &Toolkit) -> Result<()> {
        self.sdk.ensure_bootstrapped(toolkit)?;
        for action in &self.actions {
            self.action(toolkit, action)?;
        }
        Ok(())
    }

    /// Run `command` with the source tree mounted read-write.
    pub fn run(&self, toolkit: &Toolkit, command: Vec<String>) -> Result<()> {
        self.sdk.ensure_bootstrapped(toolkit)?;
        info!("Running {:?} for recipe '{}'", command, self.name);
        RunInvocation::new(
            self.sdk.image_ref(),
            command,
            ACTION_RUN,
            &self.sdk,
            Some(self),
        )
        .execute(toolkit)
    }
}
