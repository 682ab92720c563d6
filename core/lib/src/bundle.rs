//! Builds the zip that becomes an application version.
//!
//! The archive always carries one deployment descriptor and the
//! `.ebextensions/` directory. When ignore-based bundling is on and the
//! project has a `.ebignore`, the whole project tree (minus ignored paths)
//! goes in first and the descriptor and extensions are laid on top.

use crate::error::{EbiError, EbiResult, ErrorContext};
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

pub const DOCKERRUN_NAME: &str = "Dockerrun.aws.json";
pub const COMPOSE_NAME: &str = "docker-compose.yml";
pub const EBEXTENSIONS_DIR: &str = ".ebextensions";
pub const EBIGNORE_NAME: &str = ".ebignore";

/// Top-level entries never copied from the project tree. The descriptors and
/// extensions are laid down afterwards from the selected sources only.
const ALWAYS_SKIPPED: &[&str] = &[
    ".git",
    ".elasticbeanstalk",
    DOCKERRUN_NAME,
    COMPOSE_NAME,
    EBEXTENSIONS_DIR,
];

/// What goes into a bundle. Relative paths resolve against `source_dir`.
#[derive(Debug, Clone)]
pub struct BundleSpec {
    pub version_label: String,
    pub dockerrun: Option<PathBuf>,
    pub docker_compose: Option<PathBuf>,
    pub ebext: Option<PathBuf>,
    pub use_ebignore: bool,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl BundleSpec {
    pub fn new(version_label: impl Into<String>, source_dir: impl Into<PathBuf>) -> Self {
        let source_dir = source_dir.into();
        Self {
            version_label: version_label.into(),
            dockerrun: None,
            docker_compose: None,
            ebext: None,
            use_ebignore: false,
            output_dir: source_dir.clone(),
            source_dir,
        }
    }

    /// Compose wins over Dockerrun when both are given.
    pub fn descriptor(&self) -> Descriptor {
        match (&self.docker_compose, &self.dockerrun) {
            (Some(compose), _) => Descriptor::Compose(self.source_dir.join(compose)),
            (None, Some(dockerrun)) => Descriptor::Dockerrun(self.source_dir.join(dockerrun)),
            (None, None) => Descriptor::Dockerrun(self.source_dir.join(DOCKERRUN_NAME)),
        }
    }

    pub fn ebext_dir(&self) -> PathBuf {
        self.source_dir
            .join(self.ebext.as_deref().unwrap_or(Path::new(EBEXTENSIONS_DIR)))
    }

    pub fn archive_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.zip", self.version_label))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    Dockerrun(PathBuf),
    Compose(PathBuf),
}

impl Descriptor {
    pub fn source(&self) -> &Path {
        match self {
            Descriptor::Dockerrun(path) | Descriptor::Compose(path) => path,
        }
    }

    /// Name the descriptor takes inside the archive.
    pub fn archive_name(&self) -> &'static str {
        match self {
            Descriptor::Dockerrun(_) => DOCKERRUN_NAME,
            Descriptor::Compose(_) => COMPOSE_NAME,
        }
    }
}

/// A built archive on disk. The file is deleted when the handle is dropped.
#[derive(Debug)]
pub struct Bundle {
    path: PathBuf,
}

impl Bundle {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Bundle {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed bundle"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove bundle"),
        }
    }
}

pub fn build_bundle(spec: &BundleSpec) -> EbiResult<Bundle> {
    let staging = tempfile::Builder::new().prefix("ebi-bundle-").tempdir()?;
    let archive_path = spec.archive_path();

    if spec.use_ebignore {
        let ebignore = spec.source_dir.join(EBIGNORE_NAME);
        if ebignore.is_file() {
            info!(ebignore = %ebignore.display(), "bundling project tree filtered by .ebignore");
            let matcher = load_ignore(&spec.source_dir, &ebignore)?;
            copy_filtered_tree(&spec.source_dir, staging.path(), &matcher, &archive_path)?;
        } else {
            debug!("no .ebignore found, bundling descriptor and extensions only");
        }
    }

    let descriptor = spec.descriptor();
    copy_required_file(descriptor.source(), &staging.path().join(descriptor.archive_name()))?;
    copy_required_dir(&spec.ebext_dir(), &staging.path().join(EBEXTENSIONS_DIR))?;

    if let Some(parent) = archive_path.parent() {
        fs::create_dir_all(parent)?;
    }
    // Owned before writing so a half-written archive is removed on error.
    let bundle = Bundle { path: archive_path };
    let files = write_archive(staging.path(), &bundle.path)?;

    info!(
        archive = %bundle.path.display(),
        files,
        descriptor = descriptor.archive_name(),
        "created version bundle"
    );
    Ok(bundle)
}

fn load_ignore(root: &Path, ebignore: &Path) -> EbiResult<Gitignore> {
    let mut builder = GitignoreBuilder::new(root);
    if let Some(err) = builder.add(ebignore) {
        return Err(EbiError::validation(format!("invalid {}: {}", EBIGNORE_NAME, err)));
    }
    builder
        .build()
        .map_err(|e| EbiError::validation(format!("invalid {}: {}", EBIGNORE_NAME, e)))
}

fn copy_filtered_tree(
    root: &Path,
    destination: &Path,
    matcher: &Gitignore,
    archive_path: &Path,
) -> EbiResult<()> {
    let mut entries = WalkDir::new(root).sort_by_file_name().into_iter();
    while let Some(entry) = entries.next() {
        let entry = entry.map_err(|e| {
            let message = e.to_string();
            EbiError::io(io::Error::other(message), "walking project tree failed")
        })?;
        if entry.depth() == 0 {
            continue;
        }

        let rel_path = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| EbiError::io(io::Error::other(e.to_string()), "path outside project"))?;
        let is_dir = entry.file_type().is_dir();

        let skipped = is_always_skipped(rel_path)
            || entry.path() == archive_path
            || matcher.matched(entry.path(), is_dir).is_ignore();
        if skipped {
            if is_dir {
                entries.skip_current_dir();
            }
            continue;
        }

        let target = destination.join(rel_path);
        if is_dir {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)?;
        } else {
            warn!(path = %rel_path.display(), "skipping symbolic link");
        }
    }
    Ok(())
}

fn is_always_skipped(rel_path: &Path) -> bool {
    rel_path
        .components()
        .next()
        .and_then(|c| c.as_os_str().to_str())
        .is_some_and(|first| ALWAYS_SKIPPED.contains(&first))
}

fn copy_required_file(source: &Path, target: &Path) -> EbiResult<()> {
    if !source.is_file() {
        return Err(missing_source(source, "deployment descriptor"));
    }
    fs::copy(source, target)?;
    Ok(())
}

fn copy_required_dir(source: &Path, target: &Path) -> EbiResult<()> {
    if !source.is_dir() {
        return Err(missing_source(source, "extensions directory"));
    }

    for entry in WalkDir::new(source).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let message = e.to_string();
            EbiError::io(io::Error::other(message), "walking extensions failed")
        })?;
        let rel_path = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| EbiError::io(io::Error::other(e.to_string()), "path outside extensions"))?;
        let destination = target.join(rel_path);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&destination)?;
        } else {
            fs::copy(entry.path(), &destination)?;
        }
    }
    Ok(())
}

fn missing_source(path: &Path, what: &str) -> EbiError {
    EbiError::io(
        io::Error::new(io::ErrorKind::NotFound, format!("{} not found", what)),
        format!("{} not found: {}", what, path.display()),
    )
    .with_context(ErrorContext::new("build_bundle").with_resource(path.display().to_string(), what))
}

fn write_archive(staging: &Path, archive_path: &Path) -> EbiResult<usize> {
    let mut writer = zip::ZipWriter::new(File::create(archive_path)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut file_count = 0usize;

    for entry in WalkDir::new(staging).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let message = e.to_string();
            EbiError::io(io::Error::other(message), "walking staging directory failed")
        })?;
        if entry.depth() == 0 {
            continue;
        }

        let rel_path = entry
            .path()
            .strip_prefix(staging)
            .map_err(|e| EbiError::io(io::Error::other(e.to_string()), "path outside staging"))?;
        let name = rel_path.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{name}/"), options)?;
        } else {
            writer.start_file(name, options)?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, &mut writer)?;
            file_count += 1;
        }
    }

    writer.finish()?;
    Ok(file_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let base = dir.path();
        fs::write(base.join(DOCKERRUN_NAME), "{\"AWSEBDockerrunVersion\": 1}").unwrap();
        fs::create_dir_all(base.join(".ebextensions/nested")).unwrap();
        fs::write(base.join(".ebextensions/01-env.config"), "option_settings: []\n").unwrap();
        fs::write(base.join(".ebextensions/nested/02-logs.config"), "files: {}\n").unwrap();
        fs::write(base.join("README.md"), "# demo\n").unwrap();
        dir
    }

    fn archive_files(path: &Path) -> Vec<String> {
        let zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = zip
            .file_names()
            .filter(|n| !n.ends_with('/'))
            .map(str::to_string)
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_bundles_descriptor_and_extensions_recursively() {
        let dir = project();
        let spec = BundleSpec::new("v1", dir.path());

        let bundle = build_bundle(&spec).unwrap();

        assert_eq!(bundle.path(), dir.path().join("v1.zip"));
        assert_eq!(
            archive_files(bundle.path()),
            vec![
                ".ebextensions/01-env.config",
                ".ebextensions/nested/02-logs.config",
                "Dockerrun.aws.json",
            ]
        );
    }

    #[test]
    fn test_dropping_the_bundle_removes_the_archive() {
        let dir = project();
        let bundle = build_bundle(&BundleSpec::new("v2", dir.path())).unwrap();
        let path = bundle.path().to_path_buf();
        assert!(path.exists());

        drop(bundle);
        assert!(!path.exists());
    }

    #[test]
    fn test_compose_takes_precedence_over_dockerrun() {
        let dir = project();
        fs::write(dir.path().join("compose.prod.yml"), "services: {}\n").unwrap();
        let mut spec = BundleSpec::new("v3", dir.path());
        spec.dockerrun = Some(PathBuf::from(DOCKERRUN_NAME));
        spec.docker_compose = Some(PathBuf::from("compose.prod.yml"));

        let bundle = build_bundle(&spec).unwrap();
        let files = archive_files(bundle.path());

        assert!(files.contains(&COMPOSE_NAME.to_string()));
        assert!(!files.contains(&DOCKERRUN_NAME.to_string()));
    }

    #[test]
    fn test_custom_descriptor_is_renamed_in_archive() {
        let dir = project();
        fs::create_dir_all(dir.path().join("deploy/ext")).unwrap();
        fs::write(dir.path().join("deploy/prod.json"), "{}").unwrap();
        fs::write(dir.path().join("deploy/ext/app.config"), "{}").unwrap();
        let mut spec = BundleSpec::new("v4", dir.path());
        spec.dockerrun = Some(PathBuf::from("deploy/prod.json"));
        spec.ebext = Some(PathBuf::from("deploy/ext"));

        let bundle = build_bundle(&spec).unwrap();

        assert_eq!(
            archive_files(bundle.path()),
            vec![".ebextensions/app.config", "Dockerrun.aws.json"]
        );
    }

    #[test]
    fn test_missing_descriptor_fails_without_leaving_an_archive() {
        let dir = project();
        fs::remove_file(dir.path().join(DOCKERRUN_NAME)).unwrap();

        let err = build_bundle(&BundleSpec::new("v5", dir.path())).unwrap_err();

        assert!(matches!(err, EbiError::Io { .. }));
        assert!(err.to_string().contains("deployment descriptor not found"));
        assert!(!dir.path().join("v5.zip").exists());
    }

    #[test]
    fn test_missing_extensions_fail() {
        let dir = project();
        fs::remove_dir_all(dir.path().join(EBEXTENSIONS_DIR)).unwrap();

        let err = build_bundle(&BundleSpec::new("v6", dir.path())).unwrap_err();
        assert!(err.to_string().contains("extensions directory not found"));
    }

    #[test]
    fn test_ebignore_filters_the_project_tree() {
        let dir = project();
        let base = dir.path();
        fs::write(base.join(EBIGNORE_NAME), "*.log\nnode_modules/\n").unwrap();
        fs::create_dir_all(base.join("src")).unwrap();
        fs::write(base.join("src/app.py"), "print('hi')\n").unwrap();
        fs::write(base.join("debug.log"), "noise\n").unwrap();
        fs::create_dir_all(base.join("node_modules/left-pad")).unwrap();
        fs::write(base.join("node_modules/left-pad/index.js"), "").unwrap();
        fs::create_dir_all(base.join(".git")).unwrap();
        fs::write(base.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        fs::create_dir_all(base.join(".elasticbeanstalk")).unwrap();
        fs::write(base.join(".elasticbeanstalk/config.yml"), "global: {}\n").unwrap();

        let mut spec = BundleSpec::new("v7", base);
        spec.use_ebignore = true;
        let bundle = build_bundle(&spec).unwrap();

        assert_eq!(
            archive_files(bundle.path()),
            vec![
                ".ebextensions/01-env.config",
                ".ebextensions/nested/02-logs.config",
                ".ebignore",
                "Dockerrun.aws.json",
                "README.md",
                "src/app.py",
            ]
        );
    }

    #[test]
    fn test_ebignore_tree_keeps_only_selected_descriptor_and_extensions() {
        let dir = project();
        let base = dir.path();
        fs::write(base.join(EBIGNORE_NAME), "*.log\n").unwrap();
        fs::write(base.join(COMPOSE_NAME), "services: {old: {}}\n").unwrap();
        fs::write(base.join("compose.prod.yml"), "services: {web: {}}\n").unwrap();
        fs::create_dir_all(base.join("deploy/ext")).unwrap();
        fs::write(base.join("deploy/ext/custom.config"), "{}").unwrap();

        let mut spec = BundleSpec::new("v9", base);
        spec.use_ebignore = true;
        spec.docker_compose = Some(PathBuf::from("compose.prod.yml"));
        spec.ebext = Some(PathBuf::from("deploy/ext"));
        let bundle = build_bundle(&spec).unwrap();

        assert_eq!(
            archive_files(bundle.path()),
            vec![
                ".ebextensions/custom.config",
                ".ebignore",
                "README.md",
                "compose.prod.yml",
                "deploy/ext/custom.config",
                "docker-compose.yml",
            ]
        );

        let mut zip = ZipArchive::new(File::open(bundle.path()).unwrap()).unwrap();
        let mut compose = String::new();
        io::Read::read_to_string(&mut zip.by_name(COMPOSE_NAME).unwrap(), &mut compose).unwrap();
        assert!(compose.contains("web"));
    }

    #[test]
    fn test_ebignore_flag_without_file_bundles_only_descriptor_and_extensions() {
        let dir = project();
        let mut spec = BundleSpec::new("v8", dir.path());
        spec.use_ebignore = true;

        let bundle = build_bundle(&spec).unwrap();

        assert!(!archive_files(bundle.path()).contains(&"README.md".to_string()));
    }
}
