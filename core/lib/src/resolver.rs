//! Find which environment currently owns a CNAME.

use crate::cloud::CloudClients;
use crate::error::{EbiError, EbiResult, ErrorContext};
use crate::models::{EnvironmentRoles, EnvironmentSummary};
use tracing::{debug, info};

/// Pick the environment whose CNAME starts with `<prefix>.`.
///
/// The longest matching CNAME wins; among equal lengths the one listed last.
pub fn select_environment_for_cname<'a>(
    environments: &'a [EnvironmentSummary],
    cname_prefix: &str,
) -> Option<&'a EnvironmentSummary> {
    let needle = format!("{}.", cname_prefix);
    let mut candidates: Vec<&EnvironmentSummary> = environments.iter().collect();
    candidates.sort_by_key(|env| env.cname.len());
    candidates
        .into_iter()
        .rev()
        .find(|env| env.cname.starts_with(&needle))
}

pub async fn environment_for_cname(
    clients: &dyn CloudClients,
    application_name: &str,
    cname_prefix: &str,
) -> EbiResult<String> {
    let context = || {
        ErrorContext::new("describe_environments")
            .with_resource(application_name, "application")
            .with_info(format!("cname={}", cname_prefix))
    };

    let environments = clients
        .platform()
        .list_environments(application_name)
        .await
        .map_err(|e| EbiError::from(e).with_context(context()))?;
    debug!(count = environments.len(), "listed environments");

    select_environment_for_cname(&environments, cname_prefix)
        .map(|env| env.name.clone())
        .ok_or_else(|| {
            EbiError::not_found(format!(
                "no environment of {} is routed at cname {}",
                application_name, cname_prefix
            ))
            .with_context(context())
        })
}

/// Split two environment names into primary (the routed one) and secondary.
pub fn assign_roles(routed: &str, green: &str, blue: &str) -> EbiResult<EnvironmentRoles> {
    if green == blue {
        return Err(EbiError::validation(format!(
            "green and blue environments must differ, got {} twice",
            green
        )));
    }

    let (primary, secondary) = if routed == blue {
        (blue, green)
    } else if routed == green {
        (green, blue)
    } else {
        return Err(EbiError::not_found(format!(
            "routed environment {} is neither {} nor {}",
            routed, green, blue
        ))
        .with_context(ErrorContext::new("resolve_roles").with_resource(routed, "environment")));
    };

    Ok(EnvironmentRoles {
        primary: primary.to_string(),
        secondary: secondary.to_string(),
    })
}

pub async fn resolve_roles(
    clients: &dyn CloudClients,
    application_name: &str,
    green: &str,
    blue: &str,
    cname_prefix: &str,
) -> EbiResult<EnvironmentRoles> {
    // Checked first so a typo never costs a platform call.
    if green == blue {
        return assign_roles(green, green, blue);
    }
    let routed = environment_for_cname(clients, application_name, cname_prefix).await?;
    let roles = assign_roles(&routed, green, blue)?;
    info!(
        primary = %roles.primary,
        secondary = %roles.secondary,
        "resolved environment roles"
    );
    Ok(roles)
}
