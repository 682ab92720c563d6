//! Copy autoscaling bounds from the primary environment to the secondary one
//! and wait until the secondary's instances are healthy.

use crate::clock::Clock;
use crate::cloud::CloudClients;
use crate::error::{EbiError, EbiResult, ErrorContext};
use crate::models::{CapacityBounds, EnvironmentRoles, OptionSetting, ScalingGroup};
use crate::poll::{PollConfig, poll_until};
use tracing::{debug, info};

pub const ASG_NAMESPACE: &str = "aws:autoscaling:asg";
pub const HEALTHY_STATUS: &str = "ok";

/// Autoscaling groups behind the two environments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPair {
    pub primary: String,
    pub secondary: String,
}

pub async fn find_group_names(
    clients: &dyn CloudClients,
    roles: &EnvironmentRoles,
) -> EbiResult<GroupPair> {
    let names = [roles.secondary.clone(), roles.primary.clone()];
    let groups = clients
        .scaling()
        .group_names_for_environments(&names)
        .await
        .map_err(|e| EbiError::from(e).with_context(ErrorContext::new("describe_tags")))?;

    let lookup = |env: &str| {
        groups.get(env).cloned().ok_or_else(|| {
            EbiError::not_found(format!("no autoscaling group tagged Name={}", env))
                .with_context(ErrorContext::new("describe_tags").with_resource(env, "environment"))
        })
    };

    Ok(GroupPair {
        primary: lookup(&roles.primary)?,
        secondary: lookup(&roles.secondary)?,
    })
}

async fn describe_required(clients: &dyn CloudClients, group_name: &str) -> EbiResult<ScalingGroup> {
    let context = || {
        ErrorContext::new("describe_auto_scaling_groups")
            .with_resource(group_name, "autoscaling_group")
    };
    clients
        .scaling()
        .describe_group(group_name)
        .await
        .map_err(|e| EbiError::from(e).with_context(context()))?
        .ok_or_else(|| {
            EbiError::not_found(format!("autoscaling group {} does not exist", group_name))
                .with_context(context())
        })
}

/// True when the group runs exactly `desired` instances and all report `ok`.
pub async fn instances_healthy(
    clients: &dyn CloudClients,
    group_name: &str,
    desired: i32,
) -> EbiResult<bool> {
    let group = describe_required(clients, group_name).await?;
    if group.instance_ids.len() != desired.max(0) as usize {
        debug!(
            group = group_name,
            running = group.instance_ids.len(),
            desired,
            "instance count not reached"
        );
        return Ok(false);
    }

    for instance_id in &group.instance_ids {
        let status = clients
            .instance_health()
            .instance_status(instance_id)
            .await
            .map_err(|e| {
                EbiError::from(e).with_context(
                    ErrorContext::new("describe_instance_status")
                        .with_resource(instance_id, "instance"),
                )
            })?;
        if status.as_deref() != Some(HEALTHY_STATUS) {
            debug!(instance = %instance_id, ?status, "instance not healthy yet");
            return Ok(false);
        }
    }
    Ok(true)
}

pub fn asg_option_settings(bounds: &CapacityBounds) -> Vec<OptionSetting> {
    vec![
        OptionSetting::new(ASG_NAMESPACE, "MinSize", bounds.min.to_string()),
        OptionSetting::new(ASG_NAMESPACE, "MaxSize", bounds.max.to_string()),
    ]
}

/// Mirror the primary's bounds onto the secondary, wait for health, then
/// persist MinSize/MaxSize into the secondary environment's settings.
pub async fn sync_capacity(
    clients: &dyn CloudClients,
    clock: &dyn Clock,
    poll: PollConfig,
    application_name: &str,
    roles: &EnvironmentRoles,
) -> EbiResult<CapacityBounds> {
    let groups = find_group_names(clients, roles).await?;
    let bounds = describe_required(clients, &groups.primary).await?.capacity;

    clients
        .scaling()
        .update_group_capacity(&groups.secondary, &bounds)
        .await
        .map_err(|e| {
            EbiError::from(e).with_context(
                ErrorContext::new("update_auto_scaling_group")
                    .with_resource(&groups.secondary, "autoscaling_group"),
            )
        })?;
    info!(
        group = %groups.secondary,
        desired = bounds.desired,
        min = bounds.min,
        max = bounds.max,
        "applied primary capacity to secondary group"
    );

    info!("waiting for secondary instances to become healthy");
    let checks = poll_until(clock, poll, "capacity sync", || {
        instances_healthy(clients, &groups.secondary, bounds.desired)
    })
    .await?;
    info!(checks, "all secondary instances are healthy");

    let settings = asg_option_settings(&bounds);
    clients
        .platform()
        .update_environment_options(application_name, &roles.secondary, &settings)
        .await
        .map_err(|e| {
            EbiError::from(e).with_context(
                ErrorContext::new("update_environment")
                    .with_resource(&roles.secondary, "environment"),
            )
        })?;

    Ok(bounds)
}
