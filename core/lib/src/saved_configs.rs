//! Saved configuration templates under `.elasticbeanstalk/`.
//!
//! A template reference is either a path to a YAML file or a bare name looked
//! up in `.elasticbeanstalk/saved_configs/` and then `.elasticbeanstalk/`.
//! Several templates are deep-merged into one; the last one wins.

use crate::config::EbiConfig;
use crate::ebcli::{CommandOutput, EbCliOptions, ExternalCommand, config_put_args, run_checked};
use crate::error::{EbiError, EbiResult, ErrorContext};
use crate::project::ProjectRoot;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CONFIG_EXTENSION: &str = ".cfg.yml";
pub const NAME_DELIMITER: &str = "__";
const BACKUP_SUFFIX: &str = ".ebi-backup";

/// Suffixes tried, in order, for a bare template name.
const NAME_SUFFIXES: &[&str] = &[CONFIG_EXTENSION, "", ".yml"];

fn expand_home(reference: &str) -> PathBuf {
    match reference.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(reference),
        },
        _ => PathBuf::from(reference),
    }
}

/// Find the file a template reference points at.
pub fn resolve_config_location(
    reference: &str,
    project: Option<&ProjectRoot>,
    working_dir: &Path,
) -> EbiResult<PathBuf> {
    let expanded = expand_home(reference);
    let candidate = if expanded.is_absolute() {
        expanded
    } else {
        working_dir.join(expanded)
    };
    if candidate.is_file() {
        return Ok(candidate);
    }

    let not_found = || {
        EbiError::not_found(format!("saved configuration {} not found", reference))
            .with_context(ErrorContext::new("resolve_config_location").with_info(reference))
    };

    if reference.contains(std::path::MAIN_SEPARATOR) || reference.contains('/') {
        return Err(not_found());
    }

    let project = ProjectRoot::require(project)?;
    for dir in [project.saved_configs_dir(), project.beanstalk_dir()] {
        for suffix in NAME_SUFFIXES {
            let path = dir.join(format!("{}{}", reference, suffix));
            if path.is_file() {
                debug!(reference, path = %path.display(), "resolved saved configuration");
                return Ok(path);
            }
        }
    }
    Err(not_found())
}

/// File name with every extension removed: `base.cfg.yml` becomes `base`.
pub fn template_stem(reference: &str) -> String {
    let mut name = PathBuf::from(
        Path::new(reference)
            .file_name()
            .unwrap_or_default()
            .to_os_string(),
    );
    while name.extension().is_some() {
        name = PathBuf::from(name.file_stem().unwrap_or_default().to_os_string());
    }
    name.to_string_lossy().into_owned()
}

pub fn merged_config_name(references: &[String]) -> String {
    references
        .iter()
        .map(|r| template_stem(r))
        .collect::<Vec<_>>()
        .join(NAME_DELIMITER)
}

pub fn read_template(path: &Path) -> EbiResult<Value> {
    let content = fs::read_to_string(path)
        .map_err(|e| EbiError::io(e, format!("cannot read {}", path.display())))?;
    let value: Value = serde_yaml::from_str(&content).map_err(|e| {
        EbiError::from(e).with_context(
            ErrorContext::new("read_template").with_resource(path.display().to_string(), "file"),
        )
    })?;
    Ok(match value {
        Value::Null => Value::Mapping(Mapping::new()),
        other => other,
    })
}

/// Merge `overlay` into `base`. Mappings merge key by key; anything else in
/// `overlay` replaces what `base` had.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

pub fn merge_templates(paths: &[PathBuf]) -> EbiResult<Value> {
    let mut merged = Value::Mapping(Mapping::new());
    for path in paths {
        deep_merge(&mut merged, read_template(path)?);
    }
    Ok(merged)
}

/// Resolve every reference and merge the templates in order.
pub fn merge_references(
    references: &[String],
    project: Option<&ProjectRoot>,
    working_dir: &Path,
) -> EbiResult<Value> {
    let paths = references
        .iter()
        .map(|r| resolve_config_location(r, project, working_dir))
        .collect::<EbiResult<Vec<_>>>()?;
    merge_templates(&paths)
}

fn merged_config_path(project: &ProjectRoot, name: &str) -> PathBuf {
    project
        .saved_configs_dir()
        .join(format!("{}{}", name, CONFIG_EXTENSION))
}

fn write_yaml(path: &Path, value: &Value) -> EbiResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(value)?;
    fs::write(path, yaml).map_err(|e| EbiError::io(e, format!("cannot write {}", path.display())))
}

fn backup_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}{}", file_name, BACKUP_SUFFIX))
}

/// Merged template written under `saved_configs/` for the duration of one
/// external call.
///
/// A template of the same name is first moved aside to a hidden
/// `.<name>.cfg.yml.ebi-backup` file and moved back on drop; without one the
/// merged file is simply removed. A backup left behind by an interrupted run
/// is restored before anything is written.
#[derive(Debug)]
pub struct TemporaryMergedConfig {
    name: String,
    path: PathBuf,
    backup: Option<PathBuf>,
}

impl TemporaryMergedConfig {
    pub fn create(project: &ProjectRoot, name: &str, value: &Value) -> EbiResult<Self> {
        let path = merged_config_path(project, name);
        let backup = backup_path(&path);

        if backup.is_file() {
            warn!(
                path = %path.display(),
                "restoring saved configuration left behind by an interrupted run"
            );
            fs::rename(&backup, &path)
                .map_err(|e| EbiError::io(e, format!("cannot restore {}", path.display())))?;
        }

        let backup = if path.is_file() {
            fs::copy(&path, &backup)
                .map_err(|e| EbiError::io(e, format!("cannot back up {}", path.display())))?;
            debug!(backup = %backup.display(), "backed up existing saved configuration");
            Some(backup)
        } else {
            None
        };

        let guard = Self {
            name: name.to_string(),
            path,
            backup,
        };
        write_yaml(&guard.path, value)?;
        info!(path = %guard.path.display(), "wrote temporary merged configuration");
        Ok(guard)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TemporaryMergedConfig {
    fn drop(&mut self) {
        let result = match &self.backup {
            Some(backup) => fs::rename(backup, &self.path),
            None => match fs::remove_file(&self.path) {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        match result {
            Ok(()) => debug!(path = %self.path.display(), "cleaned up merged configuration"),
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "could not clean up merged configuration"
            ),
        }
    }
}

/// Upload one template, or several merged into one, with `eb config put`.
pub async fn config_put(
    eb: &dyn ExternalCommand,
    config: &EbiConfig,
    project: Option<&ProjectRoot>,
    working_dir: &Path,
    references: &[String],
    name: Option<&str>,
    eb_options: &EbCliOptions,
) -> EbiResult<CommandOutput> {
    if references.is_empty() {
        return Err(EbiError::validation("at least one configuration is required"));
    }
    let passthrough = references.len() == 1 && name.is_none();
    let name = name
        .map(str::to_string)
        .unwrap_or_else(|| merged_config_name(references));
    let flags = EbCliOptions {
        timeout: None,
        ..eb_options.clone()
    };
    let args = config_put_args(&name, config.config_put_timeout_minutes, &flags);

    if passthrough {
        info!(name = %name, "uploading saved configuration");
        return run_checked(eb, args, "eb config put").await;
    }

    let project_root = ProjectRoot::require(project)?;
    let merged = merge_references(references, project, working_dir)?;
    let _guard = TemporaryMergedConfig::create(project_root, &name, &merged)?;
    info!(name = %name, templates = references.len(), "uploading merged configuration");
    run_checked(eb, args, "eb config put").await
}

/// Merge templates into a permanent `saved_configs/<name>.cfg.yml`.
pub fn config_merge(
    project: Option<&ProjectRoot>,
    working_dir: &Path,
    references: &[String],
    name: Option<&str>,
) -> EbiResult<PathBuf> {
    if references.is_empty() {
        return Err(EbiError::validation("at least one configuration is required"));
    }
    let project_root = ProjectRoot::require(project)?;
    let name = name
        .map(str::to_string)
        .unwrap_or_else(|| merged_config_name(references));

    let merged = merge_references(references, project, working_dir)?;
    let path = merged_config_path(project_root, &name);
    write_yaml(&path, &merged)?;
    info!(path = %path.display(), "wrote merged configuration");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws_mock::MockExternalCommand;
    use tempfile::TempDir;

    fn project() -> (TempDir, ProjectRoot) {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join(".elasticbeanstalk/saved_configs")).unwrap();
        let root = ProjectRoot::discover(temp_dir.path()).unwrap();
        (temp_dir, root)
    }

    fn yaml(text: &str) -> Value {
        serde_yaml::from_str(text).unwrap()
    }

    #[test]
    fn test_resolution_order() {
        let (temp_dir, root) = project();
        let beanstalk = root.beanstalk_dir();
        fs::write(beanstalk.join("base.cfg.yml"), "a: public").unwrap();
        fs::write(beanstalk.join("saved_configs/base.yml"), "a: private").unwrap();
        fs::write(beanstalk.join("only.yml"), "a: 1").unwrap();

        // saved_configs/ is searched before .elasticbeanstalk/
        let path = resolve_config_location("base", Some(&root), temp_dir.path()).unwrap();
        assert_eq!(path, beanstalk.join("saved_configs/base.yml"));

        let path = resolve_config_location("only", Some(&root), temp_dir.path()).unwrap();
        assert_eq!(path, beanstalk.join("only.yml"));
    }

    #[test]
    fn test_existing_paths_are_used_as_is() {
        let (temp_dir, root) = project();
        let file = temp_dir.path().join("local.yaml");
        fs::write(&file, "x: 1").unwrap();

        let path = resolve_config_location("local.yaml", Some(&root), temp_dir.path()).unwrap();
        assert_eq!(path, file);

        let err = resolve_config_location("conf/missing.yml", Some(&root), temp_dir.path())
            .unwrap_err();
        assert!(matches!(err, EbiError::NotFound { .. }));

        let err = resolve_config_location("nowhere", Some(&root), temp_dir.path()).unwrap_err();
        assert!(matches!(err, EbiError::NotFound { .. }));
    }

    #[test]
    fn test_bare_names_need_a_project() {
        let temp_dir = TempDir::new().unwrap();
        let err = resolve_config_location("base", None, temp_dir.path()).unwrap_err();
        assert!(matches!(err, EbiError::NotInitialized { .. }));
    }

    #[test]
    fn test_stems_drop_every_extension() {
        assert_eq!(template_stem("conf/base.cfg.yml"), "base");
        assert_eq!(template_stem("prod"), "prod");
        assert_eq!(
            merged_config_name(&["base.cfg.yml".to_string(), "dir/prod.yml".to_string()]),
            "base__prod"
        );
    }

    #[test]
    fn test_later_template_wins() {
        let mut merged = yaml("A:\n  B: first\n  keep: yes\nonly_first: 1\n");
        deep_merge(&mut merged, yaml("A:\n  B: second\nonly_second: 2\n"));

        assert_eq!(merged["A"]["B"], yaml("second"));
        assert_eq!(merged["A"]["keep"], yaml("yes"));
        assert_eq!(merged["only_first"], yaml("1"));
        assert_eq!(merged["only_second"], yaml("2"));
    }

    #[test]
    fn test_merge_reads_files_in_order() {
        let (temp_dir, root) = project();
        let saved = root.saved_configs_dir();
        fs::write(saved.join("a.cfg.yml"), "OptionSettings:\n  A:\n    B: one\n").unwrap();
        fs::write(saved.join("b.cfg.yml"), "OptionSettings:\n  A:\n    B: two\n").unwrap();
        fs::write(saved.join("empty.cfg.yml"), "").unwrap();

        let merged = merge_references(
            &["a".to_string(), "b".to_string(), "empty".to_string()],
            Some(&root),
            temp_dir.path(),
        )
        .unwrap();
        assert_eq!(merged["OptionSettings"]["A"]["B"], yaml("two"));
    }

    #[test]
    fn test_temporary_config_restores_previous_file() {
        let (_temp_dir, root) = project();
        let existing = root.saved_configs_dir().join("web.cfg.yml");
        fs::write(&existing, "original: true\n").unwrap();

        {
            let guard = TemporaryMergedConfig::create(&root, "web", &yaml("merged: true")).unwrap();
            assert_eq!(guard.name(), "web");
            assert!(fs::read_to_string(guard.path()).unwrap().contains("merged"));
        }
        assert_eq!(fs::read_to_string(&existing).unwrap(), "original: true\n");

        let fresh = root.saved_configs_dir().join("fresh.cfg.yml");
        {
            let _guard = TemporaryMergedConfig::create(&root, "fresh", &yaml("a: 1")).unwrap();
            assert!(fresh.exists());
        }
        assert!(!fresh.exists());
    }

    #[test]
    fn test_interrupted_run_leaves_a_recoverable_backup() {
        let (_temp_dir, root) = project();
        let existing = root.saved_configs_dir().join("web.cfg.yml");
        let backup = root.saved_configs_dir().join(".web.cfg.yml.ebi-backup");
        fs::write(&existing, "original: true\n").unwrap();

        // Drop never runs when the process is killed mid-call.
        let guard = TemporaryMergedConfig::create(&root, "web", &yaml("merged: 1")).unwrap();
        std::mem::forget(guard);
        assert_eq!(fs::read_to_string(&backup).unwrap(), "original: true\n");

        {
            let guard = TemporaryMergedConfig::create(&root, "web", &yaml("merged: 2")).unwrap();
            assert!(fs::read_to_string(guard.path()).unwrap().contains("merged: 2"));
        }
        assert_eq!(fs::read_to_string(&existing).unwrap(), "original: true\n");
        assert!(!backup.exists());
    }

    #[tokio::test]
    async fn test_config_put_single_template_passes_through() {
        let (temp_dir, root) = project();
        let eb = MockExternalCommand::new();

        config_put(
            &eb,
            &EbiConfig::default(),
            Some(&root),
            temp_dir.path(),
            &["base".to_string()],
            None,
            &EbCliOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(
            eb.calls(),
            vec![vec!["config", "put", "base", "--timeout=45"]]
        );
        assert_eq!(fs::read_dir(root.saved_configs_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_config_put_merges_and_cleans_up() {
        let (temp_dir, root) = project();
        let saved = root.saved_configs_dir();
        fs::write(saved.join("base.cfg.yml"), "A:\n  B: base\n").unwrap();
        fs::write(saved.join("prod.cfg.yml"), "A:\n  B: prod\n").unwrap();

        let eb = MockExternalCommand::with_exit_codes(vec![5]);

        let err = config_put(
            &eb,
            &EbiConfig::default(),
            Some(&root),
            temp_dir.path(),
            &["base".to_string(), "prod".to_string()],
            None,
            &EbCliOptions {
                profile: Some("ops".to_string()),
                ..EbCliOptions::default()
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.exit_code(), 5);
        assert_eq!(
            eb.calls(),
            vec![vec![
                "config",
                "put",
                "base__prod",
                "--timeout=45",
                "--profile=ops"
            ]]
        );
        assert!(!saved.join("base__prod.cfg.yml").exists());
    }

    #[test]
    fn test_config_merge_writes_permanent_file() {
        let (temp_dir, root) = project();
        let saved = root.saved_configs_dir();
        fs::write(saved.join("base.cfg.yml"), "A:\n  B: base\n  C: kept\n").unwrap();
        fs::write(saved.join("prod.cfg.yml"), "A:\n  B: prod\n").unwrap();

        let path = config_merge(
            Some(&root),
            temp_dir.path(),
            &["base".to_string(), "prod".to_string()],
            Some("combined"),
        )
        .unwrap();

        assert_eq!(path, saved.join("combined.cfg.yml"));
        let written = read_template(&path).unwrap();
        assert_eq!(written["A"]["B"], yaml("prod"));
        assert_eq!(written["A"]["C"], yaml("kept"));
    }
}
