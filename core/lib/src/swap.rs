//! Blue/green deploy: stage a version on the idle environment, optionally
//! match its capacity to the live one, then swap CNAMEs.

use crate::appversion::{StagedVersion, VersionOptions, stage_version};
use crate::capacity::sync_capacity;
use crate::context::DeployContext;
use crate::ebcli::{EbCliOptions, deploy_args, run_checked};
use crate::error::{EbiError, EbiResult, ErrorContext};
use crate::logging::DeploymentLogger;
use crate::models::{CapacityBounds, EnvironmentRoles};
use crate::poll::PollConfig;
use crate::resolver::resolve_roles;
use tracing::info;


#[derive(Debug, Clone, Default)]
pub struct SwapOptions {
    pub app_name: String,
    pub green_env: String,
    pub blue_env: String,
    /// CNAME prefix of the environment serving production traffic.
    pub cname: String,
    pub capacity: bool,
    pub noswap: bool,
    pub version: VersionOptions,
    pub eb: EbCliOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    pub roles: EnvironmentRoles,
    pub version: StagedVersion,
    pub capacity: Option<CapacityBounds>,
    pub swapped: bool,
}

pub async fn blue_green_deploy(
    ctx: &DeployContext<'_>,
    options: &SwapOptions,
    logger: &mut DeploymentLogger,
) -> EbiResult<SwapOutcome> {
    let roles = logger
        .timed(
            "resolve_roles",
            &options.cname,
            resolve_roles(
                ctx.clients,
                &options.app_name,
                &options.green_env,
                &options.blue_env,
                &options.cname,
            ),
        )
        .await?;

    let version = logger
        .timed(
            "stage_version",
            &options.app_name,
            stage_version(ctx, &options.app_name, &options.version),
        )
        .await?;

    info!(
        version = %version.label,
        environment = %roles.secondary,
        "deploying version to secondary environment"
    );
    let args = deploy_args(&roles.secondary, &version.label, &options.eb, false);
    logger
        .timed(
            "deploy",
            &roles.secondary,
            run_checked(ctx.eb, args, "eb deploy"),
        )
        .await?;

    let capacity = if options.capacity {
        let poll = PollConfig {
            interval: ctx.config.capacity.poll_interval(),
            timeout: ctx.config.capacity.timeout(),
        };
        let bounds = logger
            .timed(
                "sync_capacity",
                &roles.secondary,
                sync_capacity(ctx.clients, ctx.clock, poll, &options.app_name, &roles),
            )
            .await?;
        Some(bounds)
    } else {
        logger.skipped("sync_capacity", &roles.secondary);
        None
    };

    if options.noswap {
        logger.skipped("swap", &roles.secondary);
        info!(
            secondary = %roles.secondary,
            "done without swapping, only the secondary environment was deployed"
        );
        return Ok(SwapOutcome {
            roles,
            version,
            capacity,
            swapped: false,
        });
    }

    info!(
        primary = %roles.primary,
        new_primary = %roles.secondary,
        "swapping environment cnames"
    );
    logger
        .timed(
            "swap",
            &roles.secondary,
            swap_cnames(ctx, &roles.primary, &roles.secondary),
        )
        .await?;
    info!(
        old_primary = %roles.primary,
        new_primary = %roles.secondary,
        "done, swap the cnames back to roll back"
    );

    Ok(SwapOutcome {
        roles,
        version,
        capacity,
        swapped: true,
    })
}

pub(crate) async fn swap_cnames(
    ctx: &DeployContext<'_>,
    source: &str,
    destination: &str,
) -> EbiResult<()> {
    ctx.clients
        .platform()
        .swap_environment_cnames(source, destination)
        .await
        .map_err(|e| {
            EbiError::from(e).with_context(
                ErrorContext::new("swap_environment_cnames")
                    .with_resource(source, "environment")
                    .with_info(format!("destination={}", destination)),
            )
        })
}
