use anyhow::{Context, Result};
use distro_toolkit::{Product, Recipe, Sdk, Toolkit};
use tracing::info;

pub(crate) fn all(toolkit: &Toolkit) -> Result<()> {
    let product = Product::load(toolkit)?;
    product
        .build_all(toolkit)
        .with_context(|| format!("building product '{}'", product.short_name))
}

pub(crate) fn reconf(toolkit: &Toolkit) -> Result<()> {
    let product = Product::load(toolkit)?;
    product
        .reconfigure(toolkit)
        .with_context(|| format!("reconfiguring product '{}'", product.short_name))
}

pub(crate) fn bootstrap(toolkit: &Toolkit, name: &str) -> Result<()> {
    let sdk = Sdk::load(toolkit, name)?;
    let state = sdk.ensure_bootstrapped(toolkit)?;
    info!("SDK '{}' ready ({state})", sdk.image_ref());
    Ok(())
}

pub(crate) fn action(toolkit: &Toolkit, name: &str, action: &str) -> Result<()> {
    Recipe::load(toolkit, name)?.action(toolkit, action)
}

pub(crate) fn run(toolkit: &Toolkit, name: &str, command: Vec<String>) -> Result<()> {
    Product::load(toolkit)?.run(toolkit, name, command)
}
