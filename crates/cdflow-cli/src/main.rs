use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use cdflow_core::UserFacingError;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod context;
mod deploy;
mod destroy;
mod release;
mod shell;
mod styles;

/// The command-line interface for cdflow.
#[derive(Debug, Parser)]
#[command(name = "cdflow")]
#[command(version)]
#[command(styles = styles::get_clap_styles())]
#[command(about = "Release and deploy components to AWS with Terraform")]
#[command(
    long_about = "cdflow builds versioned release bundles of a component and deploys them
into environments mapped to AWS accounts by the account scheme named in
cdflow.yml. Terraform state lives in S3, locked through DynamoDB.

The role session name is taken from JOB_NAME or, failing that, EMAIL."
)]
#[command(
    after_help = "\x1b[1;32mExamples:\x1b[0m\n  \x1b[36mcdflow release 42\x1b[0m                 \x1b[2m# Build and publish release 42\x1b[0m\n  \x1b[36mcdflow deploy ci 42\x1b[0m               \x1b[2m# Deploy release 42 to ci\x1b[0m\n  \x1b[36mcdflow deploy live 42 --plan-only\x1b[0m \x1b[2m# Show what would change in live\x1b[0m\n  \x1b[36mcdflow shell ci\x1b[0m                   \x1b[2m# Shell with ci state and credentials\x1b[0m"
)]
pub(crate) struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a release bundle and publish it to the release bucket.
    Release(ReleaseArgs),
    /// Deploy a published release to an environment.
    Deploy(DeployArgs),
    /// Destroy everything a component has deployed to an environment.
    Destroy(DestroyArgs),
    /// Open a shell initialised against an environment's Terraform state.
    Shell(ShellArgs),
}

#[derive(Debug, Args)]
pub(crate) struct ComponentArg {
    /// Component name; defaults to the name of the git remote.
    #[arg(short = 'c', long = "component")]
    pub component: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct ReleaseArgs {
    /// Version to release; without it only a local build runs.
    pub version: Option<String>,
    #[command(flatten)]
    pub component: ComponentArg,
    /// Directory of platform config copied into the release.
    #[arg(long = "platform-config")]
    pub platform_config: Option<PathBuf>,
    /// Commit to record; defaults to the checked out HEAD.
    #[arg(long)]
    pub commit: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct DeployArgs {
    pub environment: String,
    pub version: String,
    #[command(flatten)]
    pub component: ComponentArg,
    /// Only run terraform plan.
    #[arg(long = "plan-only", default_value_t = false)]
    pub plan_only: bool,
}

#[derive(Debug, Args)]
pub(crate) struct DestroyArgs {
    pub environment: String,
    #[command(flatten)]
    pub component: ComponentArg,
    /// Only run terraform plan -destroy.
    #[arg(long = "plan-only", default_value_t = false)]
    pub plan_only: bool,
}

#[derive(Debug, Args)]
pub(crate) struct ShellArgs {
    pub environment: String,
    #[command(flatten)]
    pub component: ComponentArg,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(log_filter(std::env::var(EnvFilter::DEFAULT_ENV).ok().as_deref()))
        .init();

    let cli = Cli::parse();
    debug!("parsed cli arguments: {:?}", cli);

    if let Err(err) = execute(cli.command) {
        if let Some(user_error) = err.downcast_ref::<UserFacingError>() {
            eprintln!("error: {user_error}");
            std::process::exit(1);
        }
        return Err(err);
    }
    Ok(())
}

/// `RUST_LOG` directives, falling back to INFO when none are given.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .parse_lossy(directives.unwrap_or_default())
}

fn execute(command: Command) -> Result<()> {
    match command {
        Command::Release(args) => release::run(&args),
        Command::Deploy(args) => deploy::run(&args),
        Command::Destroy(args) => destroy::run(&args),
        Command::Shell(args) => shell::run(&args),
    }
}
