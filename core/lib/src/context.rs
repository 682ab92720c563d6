use crate::clock::Clock;
use crate::cloud::CloudClients;
use crate::config::EbiConfig;
use crate::ebcli::ExternalCommand;
use crate::project::ProjectRoot;
use std::path::{Path, PathBuf};

/// Everything a command needs from the outside world, borrowed for one run.
pub struct DeployContext<'a> {
    pub clients: &'a dyn CloudClients,
    pub eb: &'a dyn ExternalCommand,
    pub clock: &'a dyn Clock,
    pub config: &'a EbiConfig,
    pub project: Option<&'a ProjectRoot>,
    /// Directory bundle paths resolve against and archives are written to.
    pub working_dir: PathBuf,
}

impl<'a> DeployContext<'a> {
    pub fn new(
        clients: &'a dyn CloudClients,
        eb: &'a dyn ExternalCommand,
        clock: &'a dyn Clock,
        config: &'a EbiConfig,
        project: Option<&'a ProjectRoot>,
        working_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            clients,
            eb,
            clock,
            config,
            project,
            working_dir: working_dir.as_ref().to_path_buf(),
        }
    }
}
