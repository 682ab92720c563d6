use crate::commands::{BundleArgs, Session};
use clap::Args;
use ebi::{DeployOptions, EbiResult, SystemClock, deploy_environment};
use tracing::info;

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Application name to deploy
    pub app_name: String,
    /// Environment name to deploy to
    pub env_name: String,

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

    /// Deploy files staged in git rather than the HEAD commit
    #[arg(long)]
    pub staged: bool,

    #[command(flatten)]
    pub bundle: BundleArgs,
}

pub async fn run(args: DeployArgs, session: &Session) -> EbiResult<()> {
    let options = DeployOptions {
        app_name: args.app_name,
        env_name: args.env_name,
        staged: args.staged,
        eb: session.eb_options(args.timeout),
        version: args
            .bundle
            .version_options(args.version, args.prefix, args.description),
    };

    let clients = session.cloud_clients().await;
    let eb = session.eb_cli();
    let clock = SystemClock;
    let ctx = session.context(&clients, &eb, &clock);
    let mut logger = session.logger("deploy");

    let version = deploy_environment(&ctx, &options, &mut logger).await?;
    info!(
        run_id = logger.run_id(),
        version = %version.label,
        environment = %options.env_name,
        "deploy finished"
    );
    Ok(())
}
