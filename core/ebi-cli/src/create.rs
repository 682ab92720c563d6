use crate::commands::{BundleArgs, Session};
use clap::Args;
use ebi::{CreateOptions, EbiResult, SystemClock, create_environment};
use tracing::info;

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Application name
    pub app_name: String,
    /// Name of the environment to create
    pub env_name: String,
    /// CNAME prefix for the new environment
    pub cname: String,

    /// Version label to use
    #[arg(long)]
    pub version: Option<String>,

    /// Description for this version
    #[arg(long)]
    pub description: Option<String>,

    /// Saved configuration templates; several are merged, the last one wins
    #[arg(long, num_args = 1..)]
    pub cfg: Vec<String>,

    #[command(flatten)]
    pub bundle: BundleArgs,
}

pub async fn run(args: CreateArgs, session: &Session) -> EbiResult<()> {
    let options = CreateOptions {
        app_name: args.app_name,
        env_name: args.env_name,
        cname: args.cname,
        cfg: args.cfg,
        eb: session.eb_options(None),
        version: args
            .bundle
            .version_options(args.version, None, args.description),
    };

    let clients = session.cloud_clients().await;
    let eb = session.eb_cli();
    let clock = SystemClock;
    let ctx = session.context(&clients, &eb, &clock);
    let mut logger = session.logger("create");

    let version = create_environment(&ctx, &options, &mut logger).await?;
    info!(
        run_id = logger.run_id(),
        version = %version.label,
        environment = %options.env_name,
        "create finished"
    );
    Ok(())
}
