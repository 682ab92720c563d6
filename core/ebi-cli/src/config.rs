use crate::commands::Session;
use clap::{Args, Subcommand};
use ebi::{EbiResult, config_merge, config_put};
use tracing::info;

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Upload saved configuration templates with `eb config put`
    Put(ConfigPutArgs),
    /// Merge saved configuration templates into one file
    Merge(ConfigMergeArgs),
}

#[derive(Debug, Args)]
pub struct ConfigPutArgs {
    /// Configuration template names or paths; later ones win
    #[arg(required = true, num_args = 1..)]
    pub cfg_files: Vec<String>,

    /// Name of the saved configuration (default: template names joined with "__")
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Debug, Args)]
pub struct ConfigMergeArgs {
    /// Configuration template names or paths; later ones win
    #[arg(required = true, num_args = 1..)]
    pub cfg_files: Vec<String>,

    /// Name of the merged template (default: template names joined with "__")
    #[arg(long)]
    pub name: Option<String>,
}

pub async fn run(command: ConfigCommand, session: &Session) -> EbiResult<()> {
    match command {
        ConfigCommand::Put(args) => {
            let eb = session.eb_cli();
            config_put(
                &eb,
                &session.config,
                session.project.as_ref(),
                &session.working_dir,
                &args.cfg_files,
                args.name.as_deref(),
                &session.eb_options(None),
            )
            .await?;
            info!("config put finished");
        }
        ConfigCommand::Merge(args) => {
            let path = config_merge(
                session.project.as_ref(),
                &session.working_dir,
                &args.cfg_files,
                args.name.as_deref(),
            )?;
            println!("{}", path.display());
        }
    }
    Ok(())
}
