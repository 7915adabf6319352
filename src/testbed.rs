//! Virtual testbed for built images.
//!
//! Thin drivers for the scripts under `<root>/testbed/`; each runs from that
//! directory and receives the product short name and version.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::exec::CommandSpec;
use crate::product::Product;
use crate::Toolkit;

pub const SETUP_SCRIPT: &str = "./setup_testbed.sh";
pub const QEMU_IMAGE_SCRIPT: &str = "./create_qemu_image.sh";
pub const RUN_SCRIPT: &str = "./run_with_libvirt.py";

pub fn testbed_dir(repo_root: &Path) -> PathBuf {
    repo_root.join("testbed")
}

fn run_script(toolkit: &Toolkit, script: &str, args: &[&str]) -> Result<()> {
    let dir = testbed_dir(toolkit.repo_root());
    let spec = CommandSpec::new(script)
        .args(args.iter().copied())
        .current_dir(&dir);
    info!("Running '{spec}' in '{}'", dir.display());
    toolkit
        .executor()
        .execute_checked(&spec)
        .with_context(|| format!("running '{script}'"))
}

/// Build the testbed boxes and bring them up.
pub fn setup(toolkit: &Toolkit) -> Result<()> {
    run_script(toolkit, SETUP_SCRIPT, &[])
}

/// Start a VM from the product's QEMU image.
pub fn run(toolkit: &Toolkit) -> Result<()> {
    let product = Product::load(toolkit)?;
    run_script(
        toolkit,
        RUN_SCRIPT,
        &[product.short_name.as_str(), product.version.as_str()],
    )
}

/// Assemble a bootable QEMU disk image from the build outputs, then run it.
pub fn qemu(toolkit: &Toolkit) -> Result<()> {
    let product = Product::load(toolkit)?;
    run_script(
        toolkit,
        QEMU_IMAGE_SCRIPT,
        &[product.short_name.as_str(), product.version.as_str()],
    )?;
    run(toolkit)
}
