use crate::commands::{BundleArgs, Session};
use clap::Args;
use ebi::{CloneOptions, EbiResult, SystemClock, clone_deploy};
use tracing::info;

#[derive(Debug, Args)]
pub struct CloneDeployArgs {
    /// Application name to deploy
    pub app_name: String,
    /// Base name for the cloned environment
    pub env_name: String,
    /// CNAME prefix of the environment serving production traffic
    pub cname: String,

    /// Only deploy the clone; do not swap CNAMEs
    #[arg(long)]
    pub noswap: bool,

    /// Version label to use
    #[arg(long)]
    pub version: Option<String>,

    /// Description for this version
    #[arg(long)]
    pub description: Option<String>,

    #[command(flatten)]
    pub bundle: BundleArgs,
}

pub async fn run(args: CloneDeployArgs, session: &Session) -> EbiResult<()> {
    let options = CloneOptions {
        app_name: args.app_name,
        env_name: args.env_name,
        cname: args.cname,
        noswap: args.noswap,
        eb: session.eb_options(None),
        version: args
            .bundle
            .version_options(args.version, None, args.description),
    };

    let clients = session.cloud_clients().await;
    let eb = session.eb_cli();
    let clock = SystemClock;
    let ctx = session.context(&clients, &eb, &clock);
    let mut logger = session.logger("clonedeploy");

    let outcome = clone_deploy(&ctx, &options, &mut logger).await?;
    info!(
        run_id = logger.run_id(),
        version = %outcome.version.label,
        master = %outcome.master_env,
        clone = %outcome.next_env,
        cname = %outcome.next_cname,
        swapped = outcome.swapped,
        "clonedeploy finished"
    );
    Ok(())
}
