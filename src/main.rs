use anyhow::Result;
use clap::Parser;
use pkgi::config::Config;
use pkgi::resolver::ResolveMode;
use std::path::PathBuf;
use std::sync::Arc;

/// pkgi - package installer for local package sources
///
/// Resolves a package and its dependencies from one or more source folders
/// and installs them under the install root.
///
/// Examples:
///   pkgi install App --source ./feed        # Install the latest App
///   pkgi install App@2.0 --source ./feed    # Install a specific version
///   pkgi list --source ./feed               # Show available packages
#[derive(Parser, Debug)]
#[command(author, version = env!("PKGI_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Install root directory (overrides defaults; also via PKGI_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "PKGI_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub install_root: Option<PathBuf>,

    /// Fail when a declared dependency cannot be resolved
    #[arg(long, global = true)]
    pub strict: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install a package and its missing dependencies
    Install(InstallArgs),

    /// List packages offered by the sources
    List(SourceArgs),

    /// Show how each version's dependencies resolve
    Resolve(SourceArgs),
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Package to install, optionally with a version
    #[arg(value_name = "NAME[@VERSION]")]
    pub package: String,

    #[command(flatten)]
    pub sources: SourceArgs,
}

#[derive(clap::Args, Debug)]
pub struct SourceArgs {
    /// Source folder containing an index.json (repeatable)
    #[arg(long = "source", short = 's', value_name = "DIR", required = true)]
    pub sources: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = Arc::new(pkgi::runtime::RealRuntime);

    let mode = if cli.strict {
        ResolveMode::Strict
    } else {
        ResolveMode::Permissive
    };
    let config = Config::new(runtime.as_ref(), cli.install_root, mode)?;

    match cli.command {
        Commands::Install(args) => {
            pkgi::commands::install(runtime, &config, &args.sources.sources, &args.package).await?
        }
        Commands::List(args) => pkgi::commands::list(runtime, &config, &args.sources).await?,
        Commands::Resolve(args) => {
            pkgi::commands::resolve(runtime, &config, &args.sources).await?
        }
    }
    Ok(())
}
