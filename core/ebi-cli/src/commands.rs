use crate::aws::AwsCloudClients;
use crate::{bgdeploy, clonedeploy, config, create, deploy};
use clap::{Args, Subcommand};
use ebi::{
    Clock, DeployContext, DeploymentLogger, EbCli, EbCliOptions, EbiConfig, EbiError, EbiResult,
    ExternalCommand, ProjectRoot, SystemClock, VersionOptions,
};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Deploy to the idle environment of a blue/green pair and swap CNAMEs
    Bgdeploy(bgdeploy::BgDeployArgs),
    /// Clone the live environment, deploy to the clone and swap CNAMEs
    Clonedeploy(clonedeploy::CloneDeployArgs),
    /// Create a new environment running a freshly built version
    Create(create::CreateArgs),
    /// Deploy a freshly built version to an environment
    Deploy(deploy::DeployArgs),
    /// Manage saved configuration templates
    #[command(subcommand)]
    Config(config::ConfigCommand),
}

impl Commands {
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Bgdeploy(_) => "bgdeploy",
            Commands::Clonedeploy(_) => "clonedeploy",
            Commands::Create(_) => "create",
            Commands::Deploy(_) => "deploy",
            Commands::Config(config::ConfigCommand::Put(_)) => "config-put",
            Commands::Config(config::ConfigCommand::Merge(_)) => "config-merge",
        }
    }

    pub async fn run(self, session: &Session) -> EbiResult<()> {
        match self {
            Commands::Bgdeploy(args) => bgdeploy::run(args, session).await,
            Commands::Clonedeploy(args) => clonedeploy::run(args, session).await,
            Commands::Create(args) => create::run(args, session).await,
            Commands::Deploy(args) => deploy::run(args, session).await,
            Commands::Config(command) => config::run(command, session).await,
        }
    }
}

/// Files that go into the version bundle.
#[derive(Debug, Clone, Default, Args)]
pub struct BundleArgs {
    /// Path to the file used as Dockerrun.aws.json
    #[arg(long)]
    pub dockerrun: Option<PathBuf>,

    /// Path to the file used as docker-compose.yml (wins over --dockerrun)
    #[arg(long = "docker-compose")]
    pub docker_compose: Option<PathBuf>,

    /// Path to the directory used as .ebextensions/
    #[arg(long)]
    pub ebext: Option<PathBuf>,

    /// Bundle the project tree filtered by .ebignore when present (default)
    #[arg(long, overrides_with = "no_ebignore")]
    pub use_ebignore: bool,

    /// Bundle only the descriptor and .ebextensions/
    #[arg(long, overrides_with = "use_ebignore")]
    pub no_ebignore: bool,
}

impl BundleArgs {
    pub fn version_options(
        self,
        version: Option<String>,
        prefix: Option<String>,
        description: Option<String>,
    ) -> VersionOptions {
        VersionOptions {
            version,
            prefix,
            description,
            dockerrun: self.dockerrun,
            docker_compose: self.docker_compose,
            ebext: self.ebext,
            use_ebignore: self.use_ebignore || !self.no_ebignore,
        }
    }
}

/// Per-process state shared by every command.
pub struct Session {
    pub project: Option<ProjectRoot>,
    pub config: EbiConfig,
    pub working_dir: PathBuf,
    pub profile: Option<String>,
    pub region: Option<String>,
}

impl Session {
    pub fn new(profile: Option<String>, region: Option<String>) -> EbiResult<Self> {
        let working_dir = std::env::current_dir()
            .map_err(|e| EbiError::io(e, "cannot determine the working directory"))?;
        let project = ProjectRoot::discover(&working_dir);
        match &project {
            Some(root) => debug!(project = %root.path().display(), "found project root"),
            None => debug!("no .elasticbeanstalk directory found"),
        }

        let config = EbiConfig::load(project.as_ref())?;
        Ok(Self {
            profile: profile.or_else(|| config.defaults.profile.clone()),
            region: region.or_else(|| config.defaults.region.clone()),
            project,
            config,
            working_dir,
        })
    }

    pub fn eb_options(&self, timeout: Option<String>) -> EbCliOptions {
        EbCliOptions {
            profile: self.profile.clone(),
            region: self.region.clone(),
            timeout,
        }
    }

    pub async fn cloud_clients(&self) -> AwsCloudClients {
        AwsCloudClients::load(self.profile.as_deref(), self.region.as_deref()).await
    }

    pub fn eb_cli(&self) -> EbCli {
        EbCli::new(&self.config.eb_command)
    }

    pub fn context<'a>(
        &'a self,
        clients: &'a AwsCloudClients,
        eb: &'a dyn ExternalCommand,
        clock: &'a dyn Clock,
    ) -> DeployContext<'a> {
        DeployContext::new(
            clients,
            eb,
            clock,
            &self.config,
            self.project.as_ref(),
            &self.working_dir,
        )
    }

    /// Step logger for one command run; writes JSON lines when `log_dir` is set.
    pub fn logger(&self, command: &str) -> DeploymentLogger {
        let run_id = format!("{}-{}", command, SystemClock.unix_timestamp());
        let Some(log_dir) = &self.config.log_dir else {
            return DeploymentLogger::new(run_id);
        };

        let base = self
            .project
            .as_ref()
            .map(|p| p.path().to_path_buf())
            .unwrap_or_else(|| self.working_dir.clone());
        let log_dir = base.join(log_dir);
        match DeploymentLogger::with_log_dir(run_id.clone(), &log_dir) {
            Ok(logger) => logger,
            Err(e) => {
                warn!(dir = %log_dir.display(), error = %e, "step log disabled");
                DeploymentLogger::new(run_id)
            }
        }
    }
}
