use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;

mod workflows;

#[derive(Parser)]
#[command(name = "dtk")]
#[command(version, about = "Build tool for the distribution: SDKs, recipes and containers", long_about = None)]
struct Cli {
    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the repository root absolute path
    RepoRootPath,
    /// Print the short name of the product selected in config.toml
    ProductName,
    /// Print the version of the product selected in config.toml
    ProductVersion,
    /// Print the registry configured in the CI section of config.toml
    CiRegistry,
    /// List enabled instrumentation features, or test a single one
    InstrumentationFeatures {
        /// Exit successfully only if this feature is enabled
        feature: Option<String>,
    },
    /// Download pre-built binary packages from the CI
    Cache,
    /// Run every step required to build the product
    All,
    /// Rebuild the product, skipping the 'build' and 'image' steps
    Reconf,
    /// Bootstrap an SDK image
    Bootstrap {
        /// SDK to bootstrap
        recipe: String,
    },
    /// Print the image name and tag of an SDK
    Container {
        /// SDK to look up
        recipe: String,
    },
    /// Start a shell (or run a command) in the SDK of a recipe
    Run {
        /// SDK or recipe to use
        recipe: String,
        /// Command with arguments to run inside the SDK
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Build from source the rootfs of a recipe
    Build {
        /// Recipe to use
        recipe: String,
    },
    /// Build the rootfs of a recipe from the cache produced by 'build'
    Image {
        /// Recipe to use
        recipe: String,
    },
    /// Apply configuration scripts for a recipe
    Configure {
        /// Recipe to use
        recipe: String,
    },
    /// Bundle a recipe
    Bundle {
        /// Recipe to use
        recipe: String,
    },
    /// List SDKs and recipes of the selected product
    List {
        #[arg(value_enum, default_value_t = ListKind::All)]
        kind: ListKind,
    },
    /// Virtual testbed
    #[command(subcommand)]
    Test(TestCommands),
}

#[derive(Subcommand)]
enum TestCommands {
    /// Set up the testbed environment
    Setup,
    /// Create a QEMU image for testing and start a VM in the testbed
    Qemu,
    /// Start a VM in the testbed
    Run,
}

#[derive(Clone, Copy, ValueEnum)]
enum ListKind {
    Sdks,
    Recipes,
    All,
}

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(debug)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match workflows::dispatch(cli.command) {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_passes_everything_after_the_recipe_through() {
        let cli = Cli::parse_from(["dtk", "run", "core", "ls", "-la", "/mnt"]);
        match cli.command {
            Commands::Run { recipe, command } => {
                assert_eq!(recipe, "core");
                assert_eq!(command, vec!["ls", "-la", "/mnt"]);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn run_without_command_leaves_it_empty() {
        let cli = Cli::parse_from(["dtk", "--debug", "run", "demo/base"]);
        assert!(cli.debug);
        assert!(matches!(cli.command, Commands::Run { command, .. } if command.is_empty()));
    }

    #[test]
    fn instrumentation_feature_is_optional() {
        let cli = Cli::parse_from(["dtk", "instrumentation-features"]);
        assert!(matches!(
            cli.command,
            Commands::InstrumentationFeatures { feature: None }
        ));

        let cli = Cli::parse_from(["dtk", "instrumentation-features", "dev-access"]);
        assert!(matches!(
            cli.command,
            Commands::InstrumentationFeatures { feature: Some(f) } if f == "dev-access"
        ));
    }

    #[test]
    fn list_defaults_to_everything() {
        let cli = Cli::parse_from(["dtk", "list"]);
        assert!(matches!(cli.command, Commands::List { kind: ListKind::All }));
        let cli = Cli::parse_from(["dtk", "test", "qemu"]);
        assert!(matches!(cli.command, Commands::Test(TestCommands::Qemu)));
    }
}
