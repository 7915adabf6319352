use std::process::ExitCode;

use anyhow::Result;
use distro_toolkit::recipe::{ACTION_BUILD, ACTION_BUNDLE, ACTION_CONFIGURE, ACTION_IMAGE};
use distro_toolkit::{ci, testbed};

use super::{build, locate_repo_root, open_toolkit, query};
use crate::{Commands, TestCommands};

pub(crate) fn dispatch(command: Commands) -> Result<ExitCode> {
    if let Commands::RepoRootPath = command {
        println!("{}", locate_repo_root()?.display());
        return Ok(ExitCode::SUCCESS);
    }

    let toolkit = open_toolkit()?;
    match command {
        Commands::RepoRootPath => unreachable!("handled before loading the configuration"),
        Commands::ProductName => query::product_name(&toolkit)?,
        Commands::ProductVersion => query::product_version(&toolkit)?,
        Commands::CiRegistry => query::ci_registry(&toolkit)?,
        Commands::InstrumentationFeatures { feature } => {
            return Ok(query::instrumentation_features(&toolkit, feature.as_deref()));
        }
        Commands::Cache => ci::fetch_cache(&toolkit)?,
        Commands::All => build::all(&toolkit)?,
        Commands::Reconf => build::reconf(&toolkit)?,
        Commands::Bootstrap { recipe } => build::bootstrap(&toolkit, &recipe)?,
        Commands::Container { recipe } => query::container(&toolkit, &recipe)?,
        Commands::Run { recipe, command } => build::run(&toolkit, &recipe, command)?,
        Commands::Build { recipe } => build::action(&toolkit, &recipe, ACTION_BUILD)?,
        Commands::Image { recipe } => build::action(&toolkit, &recipe, ACTION_IMAGE)?,
        Commands::Configure { recipe } => build::action(&toolkit, &recipe, ACTION_CONFIGURE)?,
        Commands::Bundle { recipe } => build::action(&toolkit, &recipe, ACTION_BUNDLE)?,
        Commands::List { kind } => query::list(&toolkit, kind)?,
        Commands::Test(TestCommands::Setup) => testbed::setup(&toolkit)?,
        Commands::Test(TestCommands::Qemu) => testbed::qemu(&toolkit)?,
        Commands::Test(TestCommands::Run) => testbed::run(&toolkit)?,
    }
    Ok(ExitCode::SUCCESS)
}
