pub use serde_json;
pub use tokio;

// Core modules
pub mod appversion;
pub mod aws_mock;
pub mod bundle;
pub mod capacity;
pub mod clock;
pub mod clone;
pub mod cloud;
pub mod config;
pub mod context;
pub mod deploy;
pub mod ebcli;
pub mod error;
pub mod logging;
pub mod models;
pub mod poll;
pub mod project;
pub mod resolver;
pub mod saved_configs;
pub mod swap;

// Re-export commonly used types
pub use appversion::{StagedVersion, VersionOptions, resolve_version_label, stage_version};
pub use aws_mock::{
    MockAutoScalingClient, MockAwsCloudClients, MockBeanstalkClient, MockEc2Client,
    MockExternalCommand, MockS3Client,
};
pub use bundle::{Bundle, BundleSpec, Descriptor, build_bundle};
pub use capacity::sync_capacity;
pub use clock::{Clock, ManualClock, SystemClock};
pub use clone::{CloneOptions, CloneOutcome, clone_deploy};
pub use cloud::{
    CloudClients, CloudError, InstanceHealthClient, ObjectStoreClient, PlatformClient,
    ScalingClient,
};
pub use config::{CapacityConfig, ConfigError, DefaultsConfig, EbiConfig};
pub use context::DeployContext;
pub use deploy::{CreateOptions, DeployOptions, create_environment, deploy_environment};
pub use ebcli::{CommandOutput, EbCli, EbCliOptions, ExternalCommand};
pub use error::{EbiError, EbiResult, ErrorContext};
pub use logging::{DeploymentLogger, OperationStatus, StepLogEntry};
pub use models::{
    ApplicationVersionRequest, CapacityBounds, EnvironmentRoles, EnvironmentSummary, ObjectInfo,
    ObjectRef, OptionSetting, ScalingGroup,
};
pub use poll::{PollConfig, poll_until};
pub use project::ProjectRoot;
pub use resolver::{environment_for_cname, resolve_roles};
pub use saved_configs::{TemporaryMergedConfig, config_merge, config_put};
pub use swap::{SwapOptions, SwapOutcome, blue_green_deploy};
