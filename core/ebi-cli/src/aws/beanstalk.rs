use super::cloud_error;
use async_trait::async_trait;
use aws_sdk_elasticbeanstalk::Client;
use aws_sdk_elasticbeanstalk::types::{ConfigurationOptionSetting, S3Location};
use ebi::{
    ApplicationVersionRequest, CloudError, EnvironmentSummary, OptionSetting, PlatformClient,
};

pub struct BeanstalkClient {
    client: Client,
}

impl BeanstalkClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PlatformClient for BeanstalkClient {
    async fn list_environments(
        &self,
        application_name: &str,
    ) -> Result<Vec<EnvironmentSummary>, CloudError> {
        let output = self
            .client
            .describe_environments()
            .application_name(application_name)
            .include_deleted(false)
            .send()
            .await
            .map_err(|e| cloud_error("describe_environments", e))?;

        Ok(output
            .environments()
            .iter()
            .filter_map(|env| {
                let name = env.environment_name()?;
                Some(EnvironmentSummary::new(name, env.cname().unwrap_or_default()))
            })
            .collect())
    }

    async fn storage_location(&self) -> Result<String, CloudError> {
        let output = self
            .client
            .create_storage_location()
            .send()
            .await
            .map_err(|e| cloud_error("create_storage_location", e))?;

        output
            .s3_bucket()
            .map(str::to_string)
            .ok_or_else(|| CloudError::ResourceNotFound("storage location bucket".to_string()))
    }

    async fn create_application_version(
        &self,
        request: &ApplicationVersionRequest,
    ) -> Result<(), CloudError> {
        let source = S3Location::builder()
            .s3_bucket(&request.source_bundle.bucket)
            .s3_key(&request.source_bundle.key)
            .build();

        let mut call = self
            .client
            .create_application_version()
            .application_name(&request.application_name)
            .version_label(&request.version_label)
            .source_bundle(source);
        if !request.description.is_empty() {
            call = call.description(&request.description);
        }

        call.send()
            .await
            .map_err(|e| cloud_error("create_application_version", e))?;
        Ok(())
    }

    async fn update_environment_options(
        &self,
        application_name: &str,
        environment_name: &str,
        settings: &[OptionSetting],
    ) -> Result<(), CloudError> {
        let option_settings = settings
            .iter()
            .map(|s| {
                ConfigurationOptionSetting::builder()
                    .namespace(&s.namespace)
                    .option_name(&s.option_name)
                    .value(&s.value)
                    .build()
            })
            .collect();

        self.client
            .update_environment()
            .application_name(application_name)
            .environment_name(environment_name)
            .set_option_settings(Some(option_settings))
            .send()
            .await
            .map_err(|e| cloud_error("update_environment", e))?;
        Ok(())
    }

    async fn swap_environment_cnames(
        &self,
        source_environment: &str,
        destination_environment: &str,
    ) -> Result<(), CloudError> {
        self.client
            .swap_environment_cnames()
            .source_environment_name(source_environment)
            .destination_environment_name(destination_environment)
            .send()
            .await
            .map_err(|e| cloud_error("swap_environment_cnames", e))?;
        Ok(())
    }
}
