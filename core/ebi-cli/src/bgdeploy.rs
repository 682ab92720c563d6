use crate::commands::{BundleArgs, Session};
use clap::Args;
use ebi::{EbiResult, SwapOptions, SystemClock, blue_green_deploy};
use tracing::info;

#[derive(Debug, Args)]
pub struct BgDeployArgs {
    /// Application name to deploy
    pub app_name: String,
    /// Green environment name
    pub green_env: String,
    /// Blue environment name
    pub blue_env: String,
    /// CNAME prefix of the environment serving production traffic
    pub cname: String,

    /// Only deploy the secondary environment; do not swap CNAMEs
    #[arg(long)]
    pub noswap: bool,

    /// Match the secondary's autoscaling capacity to the primary before swapping
    #[arg(long)]
    pub capacity: bool,

    /// Version label to use
    #[arg(long)]
    pub version: Option<String>,

    /// Version label prefix; the label becomes <prefix>_<timestamp>
    #[arg(long)]
    pub prefix: Option<String>,

    /// Description for this version
    #[arg(long)]
    pub description: Option<String>,

    /// Minutes before eb deploy times out
    #[arg(long)]
    pub timeout: Option<String>,

    #[command(flatten)]
    pub bundle: BundleArgs,
}

pub async fn run(args: BgDeployArgs, session: &Session) -> EbiResult<()> {
    let options = SwapOptions {
        app_name: args.app_name,
        green_env: args.green_env,
        blue_env: args.blue_env,
        cname: args.cname,
        capacity: args.capacity,
        noswap: args.noswap,
        eb: session.eb_options(args.timeout),
        version: args
            .bundle
            .version_options(args.version, args.prefix, args.description),
    };

    let clients = session.cloud_clients().await;
    let eb = session.eb_cli();
    let clock = SystemClock;
    let ctx = session.context(&clients, &eb, &clock);
    let mut logger = session.logger("bgdeploy");

    let outcome = blue_green_deploy(&ctx, &options, &mut logger).await?;
    info!(
        run_id = logger.run_id(),
        version = %outcome.version.label,
        primary = %outcome.roles.primary,
        secondary = %outcome.roles.secondary,
        swapped = outcome.swapped,
        "bgdeploy finished"
    );
    Ok(())
}
