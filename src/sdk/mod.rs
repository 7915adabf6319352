//! SDKs: the container images recipe actions run in.

pub mod bootstrap;

use anyhow::Result;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

use crate::config::{read_toml, require_field};
use crate::layout;
use crate::product::Product;
use crate::recipe::ACTION_RUN;
use crate::runtime::invocation::RunInvocation;
use crate::Toolkit;

pub use bootstrap::{BootstrapState, Bootstrapper};

/// Suffix of the intermediate image imported from the rootfs archive.
pub const BOOTSTRAP_TAG_SUFFIX: &str = ".bootstrap";

/// Script run inside the intermediate image, relative to the SDK directory.
pub const BOOTSTRAP_SCRIPT: &str = "./bootstrap.sh";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Root filesystem archive, relative to the repository root.
    pub rootfs: String,
    /// Informational list of bootstrap steps. The toolkit runs the bare
    /// bootstrap script; it does not pass these on.
    pub steps: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub capabilities: Vec<String>,
    /// Subdirectories of `assets/` mounted read-write for bootstrap and build.
    pub writable_assets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sdk {
    pub name: String,
    pub tag: String,
    pub bootstrap: BootstrapConfig,
    pub build: BuildConfig,
    pub environment: BTreeMap<String, String>,
    pub product: Product,
}

#[derive(Debug, Deserialize)]
struct SdkToml {
    #[serde(default)]
    tag: String,
    #[serde(default)]
    bootstrap: BootstrapConfig,
    #[serde(default)]
    build: BuildConfig,
    #[serde(default)]
    environment: BTreeMap<String, String>,
}

impl Sdk {
    /// Load `products/<product>/<name>/sdk.toml`; `name` may carry the
    /// product short name as a prefix.
    pub fn load(toolkit: &Toolkit, name: &str) -> Result<Self> {
        let product = Product::load(toolkit)?;
        Self::load_for(toolkit, product, name)
    }

    pub(crate) fn load_for(toolkit: &Toolkit, product: Product, name: &str) -> Result<Self> {
        let name = product.strip_prefix(name).to_string();
        let path = layout::sdk_config_path(toolkit.repo_root(), &product.name, &name);
        let parsed: SdkToml = read_toml(&path)?;
        require_field(&path, "tag", &parsed.tag)?;

        Ok(Self {
            name,
            tag: parsed.tag,
            bootstrap: parsed.bootstrap,
            build: parsed.build,
            environment: parsed.environment,
            product,
        })
    }

    /// `<product>/<sdk>`, without tag.
    pub fn image_name(&self) -> String {
        format!("{}/{}", self.product.name, self.name)
    }

    /// Final image reference, `<product>/<sdk>:<tag>`.
    pub fn image_ref(&self) -> String {
        format!("{}:{}", self.image_name(), self.tag)
    }

    pub fn bootstrap_tag(&self) -> String {
        format!("{}{}", self.tag, BOOTSTRAP_TAG_SUFFIX)
    }

    /// Intermediate image reference in the local store.
    pub fn bootstrap_ref(&self) -> String {
        format!("localhost/{}:{}", self.image_name(), self.bootstrap_tag())
    }

    pub fn env(&self) -> Vec<(String, String)> {
        let mut env = vec![
            ("DTK_SDK_PRODUCT".to_string(), self.product.short_name.clone()),
            ("DTK_SDK_RECIPE".to_string(), self.name.clone()),
        ];
        env.extend(
            self.environment
                .iter()
                .map(|(k, v)| (format!("DTK_SDK_ENV_{k}"), v.clone())),
        );
        env
    }

    /// Make sure the final image exists, building it if needed.
    pub fn ensure_bootstrapped(&self, toolkit: &Toolkit) -> Result<BootstrapState> {
        let history = Bootstrapper::new(toolkit, self)?.run()?;
        Ok(history.last().copied().unwrap_or(BootstrapState::Absent))
    }

    /// Run `command` in a throwaway container of this SDK.
    pub fn run(&self, toolkit: &Toolkit, command: Vec<String>) -> Result<()> {
        self.ensure_bootstrapped(toolkit)?;
        info!("Running {:?} in SDK '{}'", command, self.image_ref());
        RunInvocation::new(self.image_ref(), command, ACTION_RUN, self, None).execute(toolkit)
    }
}
