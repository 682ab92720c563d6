//! Build, upload and register an application version.

use crate::bundle::{BundleSpec, build_bundle};
use crate::clock::Clock;
use crate::cloud::CloudClients;
use crate::context::DeployContext;
use crate::error::{EbiError, EbiResult, ErrorContext};
use crate::models::{ApplicationVersionRequest, ObjectRef};
use std::path::{Path, PathBuf};
use tracing::info;

/// Version-related flags shared by every staging command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionOptions {
    pub version: Option<String>,
    pub prefix: Option<String>,
    pub description: Option<String>,
    pub dockerrun: Option<PathBuf>,
    pub docker_compose: Option<PathBuf>,
    pub ebext: Option<PathBuf>,
    pub use_ebignore: bool,
}

/// A registered version and the object it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedVersion {
    pub label: String,
    pub source: ObjectRef,
}

/// Explicit label, else `<prefix>_<unix_ts>`, else `<unix_ts>`.
pub fn resolve_version_label(
    explicit: Option<&str>,
    prefix: Option<&str>,
    clock: &dyn Clock,
) -> String {
    match (explicit, prefix) {
        (Some(version), _) if !version.is_empty() => version.to_string(),
        (_, Some(prefix)) if !prefix.is_empty() => {
            format!("{}_{}", prefix, clock.unix_timestamp())
        }
        _ => clock.unix_timestamp().to_string(),
    }
}

pub fn object_key(application_name: &str, file_name: &str) -> String {
    format!("{}/{}", application_name, file_name)
}

/// Upload `archive` to the platform bucket unless the key already exists.
pub async fn upload_bundle(
    clients: &dyn CloudClients,
    application_name: &str,
    archive: &Path,
) -> EbiResult<ObjectRef> {
    let file_name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| EbiError::validation(format!("not a file: {}", archive.display())))?;

    let bucket = clients.platform().storage_location().await.map_err(|e| {
        EbiError::from(e).with_context(ErrorContext::new("create_storage_location"))
    })?;
    let key = object_key(application_name, &file_name);
    let object = ObjectRef { bucket, key };

    let existing = clients
        .object_store()
        .head_object(&object.bucket, &object.key)
        .await
        .map_err(|e| {
            EbiError::from(e).with_context(
                ErrorContext::new("head_object").with_resource(object.to_string(), "s3_object"),
            )
        })?;

    match existing {
        Some(info) => {
            info!(
                object = %object,
                size = info.content_length,
                "object already exists, skipping upload"
            );
        }
        None => {
            info!(object = %object, "uploading archive");
            clients
                .object_store()
                .put_object(&object.bucket, &object.key, archive)
                .await
                .map_err(|e| {
                    EbiError::from(e).with_context(
                        ErrorContext::new("put_object")
                            .with_resource(object.to_string(), "s3_object"),
                    )
                })?;
        }
    }

    Ok(object)
}

pub async fn register_version(
    clients: &dyn CloudClients,
    application_name: &str,
    version_label: &str,
    description: &str,
    source: &ObjectRef,
) -> EbiResult<()> {
    info!(
        application = application_name,
        version = version_label,
        "creating application version"
    );
    let request = ApplicationVersionRequest {
        application_name: application_name.to_string(),
        version_label: version_label.to_string(),
        description: description.to_string(),
        source_bundle: source.clone(),
    };

    clients
        .platform()
        .create_application_version(&request)
        .await
        .map_err(|e| {
            EbiError::from(e).with_context(
                ErrorContext::new("create_application_version")
                    .with_resource(version_label, "application_version")
                    .with_info(format!("application={}", application_name)),
            )
        })
}

/// Build the bundle, upload it and register it as a version.
///
/// The local archive is removed once this returns, whatever the outcome.
pub async fn stage_version(
    ctx: &DeployContext<'_>,
    application_name: &str,
    options: &VersionOptions,
) -> EbiResult<StagedVersion> {
    let label = resolve_version_label(
        options.version.as_deref(),
        options.prefix.as_deref(),
        ctx.clock,
    );

    let spec = BundleSpec {
        version_label: label.clone(),
        dockerrun: options.dockerrun.clone(),
        docker_compose: options.docker_compose.clone(),
        ebext: options.ebext.clone(),
        use_ebignore: options.use_ebignore,
        source_dir: ctx.working_dir.clone(),
        output_dir: ctx.working_dir.clone(),
    };
    let bundle = build_bundle(&spec)?;

    let source = upload_bundle(ctx.clients, application_name, bundle.path()).await?;
    register_version(
        ctx.clients,
        application_name,
        &label,
        options.description.as_deref().unwrap_or_default(),
        &source,
    )
    .await?;
    drop(bundle);

    Ok(StagedVersion { label, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws_mock::{MockAwsCloudClients, MockExternalCommand};
    use crate::clock::ManualClock;
    use crate::config::EbiConfig;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_label_prefers_explicit_then_prefix_then_timestamp() {
        let clock = ManualClock::new(1_700_000_000);

        assert_eq!(resolve_version_label(Some("v42"), Some("web"), &clock), "v42");
        assert_eq!(
            resolve_version_label(None, Some("web"), &clock),
            "web_1700000000"
        );

        let label = resolve_version_label(None, None, &clock);
        assert_eq!(label, "1700000000");
        assert!(label.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_upload_is_skipped_when_key_exists() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("v1.zip");
        fs::write(&archive, b"zip bytes").unwrap();
        let clients = MockAwsCloudClients::new("eb-bucket");

        let first = upload_bundle(&clients, "demo", &archive).await.unwrap();
        let second = upload_bundle(&clients, "demo", &archive).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.bucket, "eb-bucket");
        assert_eq!(first.key, "demo/v1.zip");
        assert_eq!(clients.object_store.puts().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_existence_check_stops_before_upload() {
        let temp_dir = TempDir::new().unwrap();
        let archive = temp_dir.path().join("v1.zip");
        fs::write(&archive, b"zip bytes").unwrap();
        let clients = MockAwsCloudClients::new("eb-bucket");
        clients.object_store.fail_on("head_object", "503 Slow Down");

        let err = upload_bundle(&clients, "demo", &archive).await.unwrap_err();

        assert!(matches!(err, EbiError::Transport { .. }));
        assert_eq!(
            err.context().map(|c| c.operation.as_str()),
            Some("head_object")
        );
        assert!(clients.object_store.puts().is_empty());
    }

    #[tokio::test]
    async fn test_registration_failure_is_reported() {
        let clients = MockAwsCloudClients::new("eb-bucket");
        clients
            .platform
            .fail_on("create_application_version", "throttled");
        let source = ObjectRef {
            bucket: "eb-bucket".to_string(),
            key: "demo/v1.zip".to_string(),
        };

        let err = register_version(&clients, "demo", "v1", "", &source)
            .await
            .unwrap_err();
        assert_eq!(err.category(), "transport");
        assert_eq!(
            err.context().map(|c| c.operation.as_str()),
            Some("create_application_version")
        );
    }

    #[tokio::test]
    async fn test_stage_version_builds_uploads_registers_and_cleans_up() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("Dockerrun.aws.json"), "{}").unwrap();
        fs::create_dir_all(temp_dir.path().join(".ebextensions")).unwrap();
        fs::write(temp_dir.path().join(".ebextensions/01.config"), "option_settings: []").unwrap();

        let clients = MockAwsCloudClients::new("eb-bucket");
        let eb = MockExternalCommand::new();
        let clock = ManualClock::new(1_700_000_000);
        let config = EbiConfig::default();
        let ctx = DeployContext::new(&clients, &eb, &clock, &config, None, temp_dir.path());

        let options = VersionOptions {
            prefix: Some("web".to_string()),
            description: Some("release".to_string()),
            ..VersionOptions::default()
        };
        let staged = stage_version(&ctx, "demo", &options).await.unwrap();

        assert_eq!(staged.label, "web_1700000000");
        assert_eq!(staged.source.key, "demo/web_1700000000.zip");

        let versions = clients.platform.versions();
        assert_eq!(versions.len(), 1);
        assert_eq!(versions[0].description, "release");
        assert_eq!(versions[0].source_bundle, staged.source);

        assert!(!temp_dir.path().join("web_1700000000.zip").exists());
        assert!(eb.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_descriptor_stops_before_upload() {
        let temp_dir = TempDir::new().unwrap();
        let clients = MockAwsCloudClients::new("eb-bucket");
        let eb = MockExternalCommand::new();
        let clock = ManualClock::new(1);
        let config = EbiConfig::default();
        let ctx = DeployContext::new(&clients, &eb, &clock, &config, None, temp_dir.path());

        let err = stage_version(&ctx, "demo", &VersionOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, EbiError::Io { .. }));
        assert!(clients.object_store.puts().is_empty());
        assert!(clients.platform.versions().is_empty());
    }
}
