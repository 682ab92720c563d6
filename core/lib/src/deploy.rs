//! Single-environment commands: `deploy` and `create`.

use crate::appversion::{StagedVersion, VersionOptions, stage_version};
use crate::context::DeployContext;
use crate::ebcli::{EbCliOptions, create_args, deploy_args, run_checked};
use crate::error::EbiResult;
use crate::logging::DeploymentLogger;
use crate::project::ProjectRoot;
use crate::saved_configs::{TemporaryMergedConfig, merge_references, merged_config_name};
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub app_name: String,
    pub env_name: String,
    /// Pass `--staged` through to `eb deploy`.
    pub staged: bool,
    pub version: VersionOptions,
    pub eb: EbCliOptions,
}

#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub app_name: String,
    pub env_name: String,
    pub cname: String,
    /// Saved configuration references; more than one are merged first.
    pub cfg: Vec<String>,
    pub version: VersionOptions,
    pub eb: EbCliOptions,
}

pub async fn deploy_environment(
    ctx: &DeployContext<'_>,
    options: &DeployOptions,
    logger: &mut DeploymentLogger,
) -> EbiResult<StagedVersion> {
    let version = logger
        .timed(
            "stage_version",
            &options.app_name,
            stage_version(ctx, &options.app_name, &options.version),
        )
        .await?;

    info!(version = %version.label, environment = %options.env_name, "deploying version");
    let args = deploy_args(&options.env_name, &version.label, &options.eb, options.staged);
    logger
        .timed(
            "deploy",
            &options.env_name,
            run_checked(ctx.eb, args, "eb deploy"),
        )
        .await?;

    Ok(version)
}

pub async fn create_environment(
    ctx: &DeployContext<'_>,
    options: &CreateOptions,
    logger: &mut DeploymentLogger,
) -> EbiResult<StagedVersion> {
    // Templates are merged before anything is uploaded so a bad reference
    // fails fast. The guard lives until `eb create` returns.
    let merged = if options.cfg.len() > 1 {
        let project = ProjectRoot::require(ctx.project)?;
        let value = merge_references(&options.cfg, ctx.project, &ctx.working_dir)?;
        let name = merged_config_name(&options.cfg);
        let guard = TemporaryMergedConfig::create(project, &name, &value)?;
        info!(
            templates = options.cfg.len(),
            path = %guard.path().display(),
            "merged saved configurations"
        );
        Some(guard)
    } else {
        None
    };
    let cfg_name = match &merged {
        Some(guard) => Some(guard.name()),
        None => options.cfg.first().map(String::as_str),
    };

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

    info!(version = %version.label, environment = %options.env_name, "creating environment");
    let flags = EbCliOptions {
        timeout: None,
        ..options.eb.clone()
    };
    let args = create_args(
        &options.env_name,
        &version.label,
        &options.cname,
        ctx.config.create_timeout_minutes,
        cfg_name,
        &flags,
    );
    logger
        .timed(
            "create",
            &options.env_name,
            run_checked(ctx.eb, args, "eb create"),
        )
        .await?;

    drop(merged);
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws_mock::{MockAwsCloudClients, MockExternalCommand};
    use crate::clock::ManualClock;
    use crate::config::EbiConfig;
    use std::fs;
    use tempfile::TempDir;

    fn project_dir() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("Dockerrun.aws.json"), "{}").unwrap();
        fs::create_dir_all(temp_dir.path().join(".ebextensions")).unwrap();
        fs::create_dir_all(temp_dir.path().join(".elasticbeanstalk/saved_configs")).unwrap();
        temp_dir
    }

    #[tokio::test]
    async fn test_deploy_passes_flags_and_exit_code() {
        let project = project_dir();
        let clients = MockAwsCloudClients::new("bucket");
        let eb = MockExternalCommand::with_exit_codes(vec![3]);
        let clock = ManualClock::new(100);
        let config = EbiConfig::default();
        let ctx = DeployContext::new(&clients, &eb, &clock, &config, None, project.path());
        let mut logger = DeploymentLogger::new("test");

        let options = DeployOptions {
            app_name: "demo".to_string(),
            env_name: "demo-blue".to_string(),
            staged: true,
            version: VersionOptions {
                prefix: Some("api".to_string()),
                ..VersionOptions::default()
            },
            eb: EbCliOptions {
                profile: None,
                region: Some("us-west-2".to_string()),
                timeout: Some("15".to_string()),
            },
        };
        let err = deploy_environment(&ctx, &options, &mut logger)
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), 3);
        assert_eq!(
            eb.calls(),
            vec![vec![
                "deploy",
                "demo-blue",
                "--version=api_100",
                "--region=us-west-2",
                "--timeout=15",
                "--staged",
            ]]
        );
        assert_eq!(clients.platform.versions().len(), 1);
    }

    #[tokio::test]
    async fn test_create_with_single_cfg_passes_name_through() {
        let project = project_dir();
        let clients = MockAwsCloudClients::new("bucket");
        let eb = MockExternalCommand::new();
        let clock = ManualClock::new(100);
        let config = EbiConfig::default();
        let ctx = DeployContext::new(&clients, &eb, &clock, &config, None, project.path());
        let mut logger = DeploymentLogger::new("test");

        let options = CreateOptions {
            app_name: "demo".to_string(),
            env_name: "demo-green".to_string(),
            cname: "demo-next".to_string(),
            cfg: vec!["base".to_string()],
            // create ignores the prefix
            version: VersionOptions {
                prefix: Some("api".to_string()),
                ..VersionOptions::default()
            },
            eb: EbCliOptions {
                profile: Some("prod".to_string()),
                region: Some("us-west-2".to_string()),
                timeout: Some("15".to_string()),
            },
        };
        let version = create_environment(&ctx, &options, &mut logger)
            .await
            .unwrap();

        assert_eq!(version.label, "100");
        assert_eq!(
            eb.calls(),
            vec![vec![
                "create",
                "demo-green",
                "--timeout=45",
                "--version=100",
                "--cname=demo-next",
                "--profile=prod",
                "--cfg=base",
                "--region=us-west-2",
            ]]
        );
    }

    #[tokio::test]
    async fn test_create_merges_several_cfgs_and_removes_the_merge() {
        let project = project_dir();
        let saved = project.path().join(".elasticbeanstalk/saved_configs");
        fs::write(saved.join("base.cfg.yml"), "A:\n  B: base\n").unwrap();
        fs::write(saved.join("prod.cfg.yml"), "A:\n  B: prod\n").unwrap();
        let root = ProjectRoot::discover(project.path()).unwrap();

        let clients = MockAwsCloudClients::new("bucket");
        let eb = MockExternalCommand::new();
        let clock = ManualClock::new(100);
        let config = EbiConfig::default();
        let ctx = DeployContext::new(&clients, &eb, &clock, &config, Some(&root), project.path());
        let mut logger = DeploymentLogger::new("test");

        let options = CreateOptions {
            app_name: "demo".to_string(),
            env_name: "demo-green".to_string(),
            cname: "demo-next".to_string(),
            cfg: vec!["base".to_string(), "prod".to_string()],
            ..CreateOptions::default()
        };
        create_environment(&ctx, &options, &mut logger)
            .await
            .unwrap();

        let calls = eb.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains(&"--cfg=base__prod".to_string()));
        assert!(!saved.join("base__prod.cfg.yml").exists());
    }

    #[tokio::test]
    async fn test_create_with_unknown_cfg_uploads_nothing() {
        let project = project_dir();
        let root = ProjectRoot::discover(project.path()).unwrap();
        let clients = MockAwsCloudClients::new("bucket");
        let eb = MockExternalCommand::new();
        let clock = ManualClock::new(100);
        let config = EbiConfig::default();
        let ctx = DeployContext::new(&clients, &eb, &clock, &config, Some(&root), project.path());
        let mut logger = DeploymentLogger::new("test");

        let options = CreateOptions {
            app_name: "demo".to_string(),
            env_name: "demo-green".to_string(),
            cname: "demo-next".to_string(),
            cfg: vec!["base".to_string(), "missing".to_string()],
            ..CreateOptions::default()
        };
        let err = create_environment(&ctx, &options, &mut logger)
            .await
            .unwrap_err();

        assert_eq!(err.category(), "not_found");
        assert!(clients.object_store.puts().is_empty());
        assert!(eb.calls().is_empty());
    }
}
