//! Products: a named, versioned, ordered collection of recipes.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::config::{read_toml, require_field, RootConfig};
use crate::layout;
use crate::recipe::{Recipe, ACTION_BUILD, ACTION_IMAGE, DEFAULT_RUN_COMMAND};
use crate::sdk::Sdk;
use crate::Toolkit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    /// Directory name under `products/`, as selected in `config.toml`.
    pub name: String,
    pub version: String,
    pub common_name: String,
    pub short_name: String,
    pub homepage: String,
    pub recipes: Vec<String>,
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ProductToml {
    #[serde(default)]
    version: String,
    #[serde(default)]
    common_name: String,
    #[serde(default)]
    short_name: String,
    #[serde(default)]
    homepage: String,
    #[serde(default)]
    recipes: Vec<String>,
    #[serde(default)]
    environment: BTreeMap<String, String>,
}

impl Product {
    /// Load the product selected in the root configuration.
    pub fn load(toolkit: &Toolkit) -> Result<Self> {
        let name = &toolkit.config().product_name;
        let path = layout::product_config_path(toolkit.repo_root(), name);
        let parsed: ProductToml = read_toml(&path)?;
        require_field(&path, "version", &parsed.version)?;
        require_field(&path, "short_name", &parsed.short_name)?;

        Ok(Self {
            name: name.clone(),
            version: parsed.version,
            common_name: parsed.common_name,
            short_name: parsed.short_name,
            homepage: parsed.homepage,
            recipes: parsed.recipes,
            environment: parsed.environment,
        })
    }

    /// Drop a leading `<short_name>/` from a recipe or SDK name.
    pub fn strip_prefix<'a>(&self, name: &'a str) -> &'a str {
        name.strip_prefix(&self.short_name)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(name)
    }

    /// Version string marked when instrumentation features are enabled.
    pub fn tainted_version(&self, config: &RootConfig) -> String {
        if config.instrumented() {
            format!("{}+instrumented", self.version)
        } else {
            self.version.clone()
        }
    }

    pub fn env(&self, config: &RootConfig) -> Vec<(String, String)> {
        let mut env = vec![
            ("DTK_PRODUCT_VERSION".to_string(), self.version.clone()),
            (
                "DTK_PRODUCT_TAINTED_VERSION".to_string(),
                self.tainted_version(config),
            ),
            ("DTK_PRODUCT_COMMON_NAME".to_string(), self.common_name.clone()),
            ("DTK_PRODUCT_SHORT_NAME".to_string(), self.short_name.clone()),
            ("DTK_PRODUCT".to_string(), self.short_name.clone()),
            ("DTK_PRODUCT_HOMEPAGE".to_string(), self.homepage.clone()),
        ];
        env.extend(
            self.environment
                .iter()
                .map(|(k, v)| (format!("DTK_PRODUCT_ENV_{k}"), v.clone())),
        );
        env
    }

    /// Run `command` (or a shell) in the SDK or recipe called `name`.
    /// SDK names win over recipe names.
    pub fn run(&self, toolkit: &Toolkit, name: &str, command: Vec<String>) -> Result<()> {
        let command = if command.is_empty() {
            vec![DEFAULT_RUN_COMMAND.to_string()]
        } else {
            command
        };

        let unit = self.strip_prefix(name);
        let sdks = layout::list_sdks(toolkit.repo_root(), &self.name)?;
        if sdks.iter().any(|sdk| sdk == unit) {
            return Sdk::load_for(toolkit, self.clone(), unit)?.run(toolkit, command);
        }
        Recipe::load(toolkit, unit)?.run(toolkit, command)
    }

    /// Every recipe, every declared action, in declaration order.
    pub fn build_all(&self, toolkit: &Toolkit) -> Result<()> {
        for name in &self.recipes {
            info!("Building recipe '{name}'");
            let recipe = Recipe::load(toolkit, name)?;
            recipe
                .all_actions(toolkit)
                .with_context(|| format!("building recipe '{name}'"))?;
        }
        Ok(())
    }

    /// Like [`build_all`](Self::build_all) but skips `build` and `image`.
    pub fn reconfigure(&self, toolkit: &Toolkit) -> Result<()> {
        for name in &self.recipes {
            let recipe = Recipe::load(toolkit, name)?;
            for action in &recipe.actions {
                if action == ACTION_BUILD || action == ACTION_IMAGE {
                    continue;
                }
                recipe
                    .action(toolkit, action)
                    .with_context(|| format!("reconfiguring recipe '{name}'"))?;
            }
        }
        Ok(())
    }
}
