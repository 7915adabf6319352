//! Root configuration (`<root>/config.toml`) and the TOML loading helper
//! shared by product, recipe and SDK files.

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ToolkitError;
use crate::layout;

/// Value of `development.network` that re-enables network access.
pub const NETWORK_ENABLED: &str = "yes";

/// Read and deserialize a TOML file, classifying failures.
pub(crate) fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|source| ToolkitError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = toml::from_str(&content).map_err(|source| ToolkitError::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parsed)
}

pub(crate) fn require_field(path: &Path, field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ToolkitError::MissingField {
            path: path.to_path_buf(),
            field,
        }
        .into());
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootConfig {
    /// Directory name of the selected product under `products/`.
    pub product_name: String,
    pub ci: CiConfig,
    pub development: DevelopmentConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CiConfig {
    pub url: String,
    pub registry: String,
    pub project_id: String,
    pub artifacts: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DevelopmentConfig {
    pub network: String,
    pub instrumentation: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RootConfigToml {
    #[serde(default)]
    product: ProductSelectionToml,
    #[serde(default)]
    ci: CiConfig,
    #[serde(default)]
    development: DevelopmentConfig,
}

#[derive(Debug, Default, Deserialize)]
struct ProductSelectionToml {
    #[serde(default)]
    name: String,
}

impl RootConfig {
    pub fn load(repo_root: &Path) -> Result<Self> {
        let path = layout::root_config_path(repo_root);
        let parsed: RootConfigToml = read_toml(&path)?;
        require_field(&path, "product.name", &parsed.product.name)?;

        Ok(Self {
            product_name: parsed.product.name,
            ci: parsed.ci,
            development: parsed.development,
        })
    }

    /// The CI registry, if one is configured.
    pub fn ci_registry(&self) -> Option<&str> {
        let registry = self.ci.registry.trim();
        (!registry.is_empty()).then_some(registry)
    }

    pub fn network_enabled(&self) -> bool {
        self.development.network == NETWORK_ENABLED
    }

    pub fn instrumented(&self) -> bool {
        !self.development.instrumentation.is_empty()
    }

    pub fn has_instrumentation_feature(&self, feature: &str) -> bool {
        self.development
            .instrumentation
            .iter()
            .any(|enabled| enabled == feature)
    }

    /// `KEY=VALUE` pairs this configuration contributes to containers.
    pub fn env(&self) -> Vec<(String, String)> {
        vec![(
            "DTK_INSTRUMENTATION_FEATURES".to_string(),
            self.development.instrumentation.join(" "),
        )]
    }
}
