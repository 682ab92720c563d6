use clap::Parser;
use commands::{Commands, Session};
use std::process;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

mod aws;
mod bgdeploy;
mod clonedeploy;
mod commands;
mod config;
mod create;
mod deploy;

/// Elastic Beanstalk deployments: blue/green swaps, clones and saved configs.
#[derive(Debug, Parser)]
#[command(name = "ebi", version, about)]
struct Cli {
    /// AWS profile passed to the SDK and to eb
    #[arg(long, global = true)]
    profile: Option<String>,

    /// AWS region passed to the SDK and to eb
    #[arg(long, global = true)]
    region: Option<String>,

    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "ebi=debug" } else { "ebi=info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let command_name = cli.command.name();
    debug!(command = command_name, "starting");

    let result = match Session::new(cli.profile, cli.region) {
        Ok(session) => cli.command.run(&session).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        error!(
            command = command_name,
            category = e.category(),
            "{}",
            e
        );
        debug!("{}", e.error_report());
        process::exit(e.exit_code());
    }
}
