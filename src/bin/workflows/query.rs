use std::process::ExitCode;

use anyhow::Result;
use distro_toolkit::{layout, Product, Sdk, Toolkit};

use crate::ListKind;

pub(crate) fn product_name(toolkit: &Toolkit) -> Result<()> {
    println!("{}", Product::load(toolkit)?.short_name);
    Ok(())
}

pub(crate) fn product_version(toolkit: &Toolkit) -> Result<()> {
    println!("{}", Product::load(toolkit)?.version);
    Ok(())
}

pub(crate) fn ci_registry(toolkit: &Toolkit) -> Result<()> {
    println!("{}", toolkit.config().ci.registry);
    Ok(())
}

pub(crate) fn instrumentation_features(toolkit: &Toolkit, feature: Option<&str>) -> ExitCode {
    match feature {
        Some(feature) => {
            if toolkit.config().has_instrumentation_feature(feature) {
                println!("true");
                ExitCode::SUCCESS
            } else {
                println!("false");
                ExitCode::FAILURE
            }
        }
        None => {
            for feature in &toolkit.config().development.instrumentation {
                println!("{feature}");
            }
            ExitCode::SUCCESS
        }
    }
}

pub(crate) fn container(toolkit: &Toolkit, name: &str) -> Result<()> {
    let sdk = Sdk::load(toolkit, name)?;
    println!("{}", sdk.image_ref());
    Ok(())
}

pub(crate) fn list(toolkit: &Toolkit, kind: ListKind) -> Result<()> {
    let root = toolkit.repo_root();
    let product = &toolkit.config().product_name;
    let names = match kind {
        ListKind::Sdks => layout::list_sdks(root, product)?,
        ListKind::Recipes => layout::list_recipes(root, product)?,
        ListKind::All => layout::list_all(root, product)?,
    };
    for name in names {
        println!("{name}");
    }
    Ok(())
}
