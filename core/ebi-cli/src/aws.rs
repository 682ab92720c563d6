//! AWS SDK implementations of the ebi cloud traits.

use aws_config::{BehaviorVersion, Region};
use aws_sdk_elasticbeanstalk::error::{DisplayErrorContext, ProvideErrorMetadata};
use ebi::{
    CloudClients, CloudError, InstanceHealthClient, ObjectStoreClient, PlatformClient,
    ScalingClient,
};
use tracing::debug;

mod beanstalk;
mod instances;
mod scaling;
mod storage;

use beanstalk::BeanstalkClient;
use instances::Ec2HealthClient;
use scaling::AutoScalingClient;
use storage::S3ObjectStore;

pub struct AwsCloudClients {
    platform: BeanstalkClient,
    object_store: S3ObjectStore,
    scaling: AutoScalingClient,
    instance_health: Ec2HealthClient,
}

impl AwsCloudClients {
    /// Load shared AWS configuration, honouring an explicit profile and region.
    pub async fn load(profile: Option<&str>, region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(profile) = profile {
            loader = loader.profile_name(profile);
        }
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let shared_config = loader.load().await;
        debug!(region = ?shared_config.region(), "loaded AWS configuration");

        Self {
            platform: BeanstalkClient::new(aws_sdk_elasticbeanstalk::Client::new(&shared_config)),
            object_store: S3ObjectStore::new(aws_sdk_s3::Client::new(&shared_config)),
            scaling: AutoScalingClient::new(aws_sdk_autoscaling::Client::new(&shared_config)),
            instance_health: Ec2HealthClient::new(aws_sdk_ec2::Client::new(&shared_config)),
        }
    }
}

impl CloudClients for AwsCloudClients {
    fn platform(&self) -> &dyn PlatformClient {
        &self.platform
    }

    fn object_store(&self) -> &dyn ObjectStoreClient {
        &self.object_store
    }

    fn scaling(&self) -> &dyn ScalingClient {
        &self.scaling
    }

    fn instance_health(&self) -> &dyn InstanceHealthClient {
        &self.instance_health
    }
}

/// Map an SDK failure onto `CloudError` using the service error code.
pub(crate) fn cloud_error<E>(operation: &str, err: E) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let detail = format!("{}: {}", operation, DisplayErrorContext(&err));
    match err.code() {
        Some(code) => classify_code(code, detail),
        None => CloudError::Transport(detail),
    }
}

fn classify_code(code: &str, detail: String) -> CloudError {
    match code {
        "ExpiredToken"
        | "ExpiredTokenException"
        | "InvalidClientTokenId"
        | "UnrecognizedClientException"
        | "SignatureDoesNotMatch"
        | "AuthFailure" => CloudError::Authentication(detail),
        "AccessDenied"
        | "AccessDeniedException"
        | "UnauthorizedOperation"
        | "InsufficientPrivilegesException" => CloudError::Authorization(detail),
        "NoSuchBucket" | "NotFound" | "InvalidInstanceID.NotFound" => {
            CloudError::ResourceNotFound(detail)
        }
        "Throttling" | "ThrottlingException" | "RequestLimitExceeded" | "ServiceUnavailable" => {
            CloudError::Transport(detail)
        }
        _ => CloudError::Unknown(detail),
    }
}
