use super::cloud_error;
use async_trait::async_trait;
use aws_sdk_autoscaling::Client;
use aws_sdk_autoscaling::types::Filter;
use ebi::{CapacityBounds, CloudError, ScalingClient, ScalingGroup};
use std::collections::HashMap;

pub struct AutoScalingClient {
    client: Client,
}

impl AutoScalingClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ScalingClient for AutoScalingClient {
    async fn group_names_for_environments(
        &self,
        environment_names: &[String],
    ) -> Result<HashMap<String, String>, CloudError> {
        let filter = Filter::builder()
            .name("value")
            .set_values(Some(environment_names.to_vec()))
            .build();

        let mut groups = HashMap::new();
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .describe_tags()
                .filters(filter.clone())
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| cloud_error("describe_tags", e))?;

            for tag in output.tags() {
                if tag.key() != Some("Name") {
                    continue;
                }
                if let (Some(value), Some(group)) = (tag.value(), tag.resource_id()) {
                    if environment_names.iter().any(|env| env == value) {
                        groups.insert(value.to_string(), group.to_string());
                    }
                }
            }

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }
        Ok(groups)
    }

    async fn describe_group(&self, group_name: &str) -> Result<Option<ScalingGroup>, CloudError> {
        let output = self
            .client
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(group_name)
            .send()
            .await
            .map_err(|e| cloud_error("describe_auto_scaling_groups", e))?;

        Ok(output.auto_scaling_groups().first().map(|group| ScalingGroup {
            name: group_name.to_string(),
            capacity: CapacityBounds {
                desired: group.desired_capacity().unwrap_or_default(),
                min: group.min_size().unwrap_or_default(),
                max: group.max_size().unwrap_or_default(),
            },
            instance_ids: group
                .instances()
                .iter()
                .filter_map(|i| i.instance_id().map(str::to_string))
                .collect(),
        }))
    }

    async fn update_group_capacity(
        &self,
        group_name: &str,
        capacity: &CapacityBounds,
    ) -> Result<(), CloudError> {
        self.client
            .update_auto_scaling_group()
            .auto_scaling_group_name(group_name)
            .min_size(capacity.min)
            .max_size(capacity.max)
            .desired_capacity(capacity.desired)
            .send()
            .await
            .map_err(|e| cloud_error("update_auto_scaling_group", e))?;
        Ok(())
    }
}
