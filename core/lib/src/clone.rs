//! Clone-and-deploy: copy the live environment with `eb clone --exact`,
//! deploy the new version to the copy and swap it in.

use crate::appversion::{StagedVersion, VersionOptions, stage_version};
use crate::context::DeployContext;
use crate::ebcli::{EbCliOptions, clone_args, deploy_args, run_checked};
use crate::error::EbiResult;
use crate::logging::DeploymentLogger;
use crate::resolver::environment_for_cname;
use crate::swap::swap_cnames;
use tracing::info;

const BASE36_DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    pub app_name: String,
    /// Base name the clone's name is derived from.
    pub env_name: String,
    pub cname: String,
    pub noswap: bool,
    pub version: VersionOptions,
    pub eb: EbCliOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneOutcome {
    pub master_env: String,
    pub next_env: String,
    pub next_cname: String,
    pub version: StagedVersion,
    pub swapped: bool,
}

/// Lowercase base-36 rendering; zero and negatives render as an empty string.
pub fn base36_encode(value: i64) -> String {
    let mut n = value.max(0) as u64;
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36_DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

/// `(<env>-<suffix>, <cname>-<suffix>)` with a base-36 timestamp suffix.
pub fn next_environment_names(env_name: &str, cname: &str, unix_timestamp: i64) -> (String, String) {
    let suffix = base36_encode(unix_timestamp);
    (
        format!("{}-{}", env_name, suffix),
        format!("{}-{}", cname, suffix),
    )
}

pub async fn clone_deploy(
    ctx: &DeployContext<'_>,
    options: &CloneOptions,
    logger: &mut DeploymentLogger,
) -> EbiResult<CloneOutcome> {
    let master_env = logger
        .timed(
            "resolve_master",
            &options.cname,
            environment_for_cname(ctx.clients, &options.app_name, &options.cname),
        )
        .await?;
    let (next_env, next_cname) =
        next_environment_names(&options.env_name, &options.cname, ctx.clock.unix_timestamp());

    info!(master = %master_env, clone = %next_env, cname = %next_cname, "cloning environment");
    // `eb clone` takes no deploy timeout; only profile and region pass through.
    let clone_flags = EbCliOptions {
        timeout: None,
        ..options.eb.clone()
    };
    let args = clone_args(
        &master_env,
        &next_env,
        &next_cname,
        ctx.config.clone_timeout_minutes,
        &clone_flags,
    );
    logger
        .timed("clone", &next_env, run_checked(ctx.eb, args, "eb clone"))
        .await?;

    let version_options = VersionOptions {
        prefix: None,
        ..options.version.clone()
    };
    let version = logger
        .timed(
            "stage_version",
            &options.app_name,
            stage_version(ctx, &options.app_name, &version_options),
        )
        .await?;

    info!(version = %version.label, environment = %next_env, "deploying version to clone");
    let deploy_flags = EbCliOptions {
        timeout: None,
        ..options.eb.clone()
    };
    let args = deploy_args(&next_env, &version.label, &deploy_flags, false);
    logger
        .timed("deploy", &next_env, run_checked(ctx.eb, args, "eb deploy"))
        .await?;

    if options.noswap {
        logger.skipped("swap", &next_env);
        info!(environment = %next_env, "done without swapping, only the clone was deployed");
        return Ok(CloneOutcome {
            master_env,
            next_env,
            next_cname,
            version,
            swapped: false,
        });
    }

    info!(primary = %master_env, new_primary = %next_env, "swapping environment cnames");
    logger
        .timed("swap", &next_env, swap_cnames(ctx, &master_env, &next_env))
        .await?;
    info!(
        old_primary = %master_env,
        new_primary = %next_env,
        "done, swap the cnames back to roll back"
    );

    Ok(CloneOutcome {
        master_env,
        next_env,
        next_cname,
        version,
        swapped: true,
    })
}
