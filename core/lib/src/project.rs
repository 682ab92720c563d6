use crate::error::{EbiError, EbiResult};
use std::path::{Path, PathBuf};

pub const BEANSTALK_DIR: &str = ".elasticbeanstalk";
pub const SAVED_CONFIGS_DIR: &str = "saved_configs";

/// Directory that holds the project's `.elasticbeanstalk/` folder.
///
/// Found once at startup and handed to whatever needs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRoot {
    path: PathBuf,
}

impl ProjectRoot {
    /// Walk up from `start` to the first directory containing `.elasticbeanstalk/`.
    pub fn discover(start: &Path) -> Option<Self> {
        start
            .ancestors()
            .find(|dir| dir.join(BEANSTALK_DIR).is_dir())
            .map(|dir| Self {
                path: dir.to_path_buf(),
            })
    }

    pub fn require(project: Option<&ProjectRoot>) -> EbiResult<&ProjectRoot> {
        project.ok_or_else(|| {
            EbiError::not_initialized(format!(
                "no {} directory found in this directory or any parent",
                BEANSTALK_DIR
            ))
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn beanstalk_dir(&self) -> PathBuf {
        self.path.join(BEANSTALK_DIR)
    }

    pub fn saved_configs_dir(&self) -> PathBuf {
        self.beanstalk_dir().join(SAVED_CONFIGS_DIR)
    }
}
