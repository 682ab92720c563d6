use crate::models::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// AWS-agnostic view of every remote service a command talks to.
pub trait CloudClients: Send + Sync {
    fn platform(&self) -> &dyn PlatformClient;
    fn object_store(&self) -> &dyn ObjectStoreClient;
    fn scaling(&self) -> &dyn ScalingClient;
    fn instance_health(&self) -> &dyn InstanceHealthClient;
}

/// Application hosting platform (Elastic Beanstalk).
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn list_environments(
        &self,
        application_name: &str,
    ) -> Result<Vec<EnvironmentSummary>, CloudError>;

    /// Bucket the platform reads application versions from.
    async fn storage_location(&self) -> Result<String, CloudError>;

    async fn create_application_version(
        &self,
        request: &ApplicationVersionRequest,
    ) -> Result<(), CloudError>;

    async fn update_environment_options(
        &self,
        application_name: &str,
        environment_name: &str,
        settings: &[OptionSetting],
    ) -> Result<(), CloudError>;

    async fn swap_environment_cnames(
        &self,
        source_environment: &str,
        destination_environment: &str,
    ) -> Result<(), CloudError>;
}

/// Object storage holding uploaded bundles.
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// `Ok(None)` when the key does not exist.
    async fn head_object(&self, bucket: &str, key: &str)
    -> Result<Option<ObjectInfo>, CloudError>;

    async fn put_object(&self, bucket: &str, key: &str, path: &Path) -> Result<(), CloudError>;
}

/// Autoscaling groups behind environments.
#[async_trait]
pub trait ScalingClient: Send + Sync {
    /// Map environment name to group name, using the groups' `Name` tags.
    async fn group_names_for_environments(
        &self,
        environment_names: &[String],
    ) -> Result<HashMap<String, String>, CloudError>;

    async fn describe_group(&self, group_name: &str) -> Result<Option<ScalingGroup>, CloudError>;

    async fn update_group_capacity(
        &self,
        group_name: &str,
        capacity: &CapacityBounds,
    ) -> Result<(), CloudError>;
}

/// Per-instance status checks.
#[async_trait]
pub trait InstanceHealthClient: Send + Sync {
    /// Instance status such as `"ok"`; `None` while the instance reports nothing yet.
    async fn instance_status(&self, instance_id: &str) -> Result<Option<String>, CloudError>;
}

/// Cloud provider errors
#[derive(Debug, thiserror::Error)]
pub enum CloudError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Authorization error: {0}")]
    Authorization(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unknown cloud provider error: {0}")]
    Unknown(String),
}

impl CloudError {
    pub fn remediation_steps(&self) -> Vec<String> {
        match self {
            CloudError::Authentication(_) => vec![
                "Check the --profile you passed and its credentials".to_string(),
                "Ensure your access keys are valid and not expired".to_string(),
            ],
            CloudError::Authorization(_) => vec![
                "Check your IAM permissions for elasticbeanstalk, s3, autoscaling and ec2"
                    .to_string(),
            ],
            CloudError::ResourceNotFound(_) => vec![
                "Verify the resource name and identifier".to_string(),
                "Check if the resource exists in the selected region".to_string(),
            ],
            CloudError::Transport(_) => vec![
                "Check your network connection".to_string(),
                "Check AWS service status and try again".to_string(),
            ],
            CloudError::Unknown(_) => vec!["Review the error message for details".to_string()],
        }
    }
}
