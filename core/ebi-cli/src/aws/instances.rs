use super::cloud_error;
use async_trait::async_trait;
use aws_sdk_ec2::Client;
use ebi::{CloudError, InstanceHealthClient};

pub struct Ec2HealthClient {
    client: Client,
}

impl Ec2HealthClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl InstanceHealthClient for Ec2HealthClient {
    async fn instance_status(&self, instance_id: &str) -> Result<Option<String>, CloudError> {
        let output = self
            .client
            .describe_instance_status()
            .instance_ids(instance_id)
            .send()
            .await
            .map_err(|e| cloud_error("describe_instance_status", e))?;

        // No entry until the instance is running.
        Ok(output
            .instance_statuses()
            .first()
            .and_then(|s| s.instance_status())
            .and_then(|s| s.status())
            .map(|s| s.as_str().to_string()))
    }
}
