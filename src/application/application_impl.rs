use std::collections::HashSet;
use std::io::Write;
use std::path::{Component, Path};

use compio::fs;
use snafu::Snafu;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::application::RuntimeConfig;
use crate::application::listing::write_listing;
use crate::cli::Command;
use crate::config::{CONFIG_FILE_NAME, ConfigError, EmbedConfig};
use crate::embed::{
    BundleError, InclusionPattern, PatternError, QueryError, ResolveError, VirtualFileSet,
    resolve_all,
};
use crate::ext::BestEffortPathExt;
use crate::filesystem::{DirectoryTree, SnapshotError};

pub const DEFAULT_BUNDLE_FILE_NAME: &str = "embed.bundle";

pub struct Application;

impl Application {
    pub async fn run(app_config: impl Into<RuntimeConfig>) -> Result<(), ApplicationError> {
        let app_config: RuntimeConfig = app_config.into();
        let root = app_config.root.as_path();
        let config = EmbedConfig::read(root).await.context(ConfigSnafu)?;
        debug!("Loaded config: {:?}", config);

        let default_output = root.join(
            config
                .bundle
                .as_deref()
                .unwrap_or(Path::new(DEFAULT_BUNDLE_FILE_NAME)),
        );
        let color = supports_color::on(supports_color::Stream::Stdout).is_some();

        match app_config.command {
            Command::List {
                patterns,
                prefix,
                long,
            } => {
                let excluded = Self::excluded_paths(root, &default_output);
                let set = Self::resolve(root, &config, &patterns, &excluded).await?;
                write_listing(
                    &mut std::io::stdout().lock(),
                    &set,
                    prefix.as_deref(),
                    long,
                    color,
                )
                .context(OutputSnafu)
            }
            Command::Cat { path, patterns } => {
                let excluded = Self::excluded_paths(root, &default_output);
                let set = Self::resolve(root, &config, &patterns, &excluded).await?;
                let contents = set.open(&path).context(QuerySnafu)?;
                std::io::stdout()
                    .lock()
                    .write_all(contents)
                    .context(OutputSnafu)
            }
            Command::Pack { patterns, output } => {
                let output = output.unwrap_or(default_output);
                let excluded = Self::excluded_paths(root, &output);
                let set = Self::resolve(root, &config, &patterns, &excluded).await?;
                Self::pack(&set, &output).await
            }
            Command::Inspect {
                bundle,
                prefix,
                long,
            } => {
                let bytes = fs::read(&bundle).await.context(BundleReadSnafu {
                    file_path: bundle.best_effort_path_display(),
                })?;
                let set = VirtualFileSet::from_bundle(&bytes).context(BundleSnafu)?;
                write_listing(
                    &mut std::io::stdout().lock(),
                    &set,
                    prefix.as_deref(),
                    long,
                    color,
                )
                .context(OutputSnafu)
            }
        }
    }

    /// Picks the command-line patterns if any were given, the configured
    /// ones otherwise.
    fn select_patterns(
        cli_patterns: &[String],
        config: &EmbedConfig,
    ) -> Result<Vec<InclusionPattern>, ApplicationError> {
        let patterns = if cli_patterns.is_empty() {
            config.patterns.clone()
        } else {
            cli_patterns
                .iter()
                .map(|raw| InclusionPattern::parse(raw.as_str()))
                .collect::<Result<Vec<_>, _>>()
                .context(PatternSnafu)?
        };
        ensure!(!patterns.is_empty(), NoPatternsSnafu);
        Ok(patterns)
    }

    /// The config file and the bundle are never embedded, so packing twice
    /// over the same root gives the same set.
    fn excluded_paths(root: &Path, bundle: &Path) -> HashSet<String> {
        [root.join(CONFIG_FILE_NAME).as_path(), bundle]
            .into_iter()
            .filter_map(|path| relative_tree_path(root, path))
            .collect()
    }

    async fn resolve(
        root: &Path,
        config: &EmbedConfig,
        cli_patterns: &[String],
        excluded: &HashSet<String>,
    ) -> Result<VirtualFileSet, ApplicationError> {
        let patterns = Self::select_patterns(cli_patterns, config)?;
        let roots = patterns.iter().map(InclusionPattern::root);
        let tree = DirectoryTree::snapshot_selected(root, roots, excluded)
            .await
            .context(SnapshotSnafu)?;
        let set = resolve_all(&patterns, &tree).context(ResolveSnafu)?;
        info!(
            "Resolved {} patterns to {} files ({} bytes)",
            patterns.len(),
            set.len(),
            set.total_size()
        );
        Ok(set)
    }

    async fn pack(set: &VirtualFileSet, output: &Path) -> Result<(), ApplicationError> {
        let bytes = set.to_bundle().context(BundleSnafu)?;
        let file_path = output.best_effort_path_display();

        if let Some(parent) = output.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .context(BundleWriteSnafu {
                    file_path: file_path.clone(),
                })?;
        }
        let size = bytes.len();
        fs::write(output, bytes)
            .await
            .0
            .context(BundleWriteSnafu {
                file_path: file_path.clone(),
            })?;

        info!("Wrote {} files to {file_path} ({size} bytes)", set.len());
        Ok(())
    }
}

/// Expresses `path` as a slash-separated path below `root`, if it is one.
fn relative_tree_path(root: &Path, path: &Path) -> Option<String> {
    let root = std::path::absolute(root).ok()?;
    let path = std::path::absolute(path).ok()?;
    let segments = path
        .strip_prefix(&root)
        .ok()?
        .components()
        .map(|component| match component {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    (!segments.is_empty()).then(|| segments.join("/"))
}

#[derive(Debug, Snafu)]
pub enum ApplicationError {
    #[snafu(display("Critical failure encountered during configuration stage"))]
    ConfigError { source: ConfigError },
    #[snafu(display("Invalid pattern on the command line"))]
    PatternError { source: PatternError },
    #[snafu(display("No patterns given and none configured in embed.yaml"))]
    NoPatterns,
    #[snafu(display("Failed to read the directory tree"))]
    SnapshotError { source: SnapshotError },
    #[snafu(display("Failed to resolve patterns"))]
    ResolveError { source: ResolveError },
    #[snafu(display("Failed to look up an embedded file"))]
    QueryError { source: QueryError },
    #[snafu(display("Failed to process bundle"))]
    BundleError { source: BundleError },
    #[snafu(display("Failed to read bundle file: {}", file_path))]
    BundleReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to write bundle file: {}", file_path))]
    BundleWriteError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to write to stdout"))]
    OutputError { source: std::io::Error },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn project() -> TempDir {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        write(temp_dir.path(), "parent_dir/.hidden", "h");
        write(temp_dir.path(), "parent_dir/visible", "v");
        write(temp_dir.path(), "parent_dir/child_dir/.hidden", "ch");
        write(temp_dir.path(), "parent_dir/child_dir/visible", "cv");
        temp_dir
    }

    fn runtime(root: &Path, command: Command) -> RuntimeConfig {
        RuntimeConfig {
            root: root.to_path_buf(),
            command,
        }
    }

    #[compio::test]
    async fn pack_writes_a_loadable_bundle() {
        let project = project();
        let output = project.path().join("out/site.bundle");

        Application::run(runtime(
            project.path(),
            Command::Pack {
                patterns: vec!["parent_dir/*".into()],
                output: Some(output.clone()),
            },
        ))
        .await
        .unwrap();

        let set = VirtualFileSet::from_bundle(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(
            set.list("").collect::<Vec<_>>(),
            vec![
                "parent_dir/.hidden",
                "parent_dir/child_dir/visible",
                "parent_dir/visible",
            ]
        );
    }

    #[compio::test]
    async fn pack_uses_configured_patterns_and_bundle_path() {
        let project = project();
        write(
            project.path(),
            "embed.yaml",
            "patterns:\n  - \"all:parent_dir\"\nbundle: dist/app.bundle\n",
        );

        Application::run(runtime(
            project.path(),
            Command::Pack {
                patterns: Vec::new(),
                output: None,
            },
        ))
        .await
        .unwrap();

        let bytes = std::fs::read(project.path().join("dist/app.bundle")).unwrap();
        let set = VirtualFileSet::from_bundle(&bytes).unwrap();
        assert_eq!(set.len(), 4);
    }

    #[compio::test]
    async fn missing_patterns_are_reported() {
        let project = project();

        let result = Application::run(runtime(
            project.path(),
            Command::List {
                patterns: Vec::new(),
                prefix: None,
                long: false,
            },
        ))
        .await;

        assert!(matches!(result, Err(ApplicationError::NoPatterns)));
    }

    #[compio::test]
    async fn missing_root_pattern_is_reported() {
        let project = project();

        let result = Application::run(runtime(
            project.path(),
            Command::List {
                patterns: vec!["missing_dir".into()],
                prefix: None,
                long: false,
            },
        ))
        .await;

        assert!(matches!(
            result,
            Err(ApplicationError::ResolveError {
                source: ResolveError::PathNotFound { .. }
            })
        ));
    }

    #[compio::test]
    async fn cat_of_excluded_file_is_not_found() {
        let project = project();

        let result = Application::run(runtime(
            project.path(),
            Command::Cat {
                path: "parent_dir/.hidden".into(),
                patterns: vec!["parent_dir".into()],
            },
        ))
        .await;

        assert!(matches!(
            result,
            Err(ApplicationError::QueryError {
                source: QueryError::NotFound { .. }
            })
        ));
    }

    #[compio::test]
    async fn inspect_rejects_non_bundle_files() {
        let project = project();

        let result = Application::run(runtime(
            project.path(),
            Command::Inspect {
                bundle: project.path().join("parent_dir/visible"),
                prefix: None,
                long: false,
            },
        ))
        .await;

        assert!(matches!(
            result,
            Err(ApplicationError::BundleError {
                source: BundleError::BadMagic
            })
        ));
    }

    async fn pack_default(root: &Path, patterns: &[&str]) -> VirtualFileSet {
        Application::run(runtime(
            root,
            Command::Pack {
                patterns: patterns.iter().map(|pattern| pattern.to_string()).collect(),
                output: None,
            },
        ))
        .await
        .unwrap();
        let bytes = std::fs::read(root.join(DEFAULT_BUNDLE_FILE_NAME)).unwrap();
        VirtualFileSet::from_bundle(&bytes).unwrap()
    }

    #[compio::test]
    async fn repeated_pack_does_not_embed_its_own_bundle() {
        let project = project();

        let first = pack_default(project.path(), &["all:."]).await;
        let second = pack_default(project.path(), &["all:."]).await;

        assert!(!second.contains(DEFAULT_BUNDLE_FILE_NAME));
        assert_eq!(first, second);

        let plain = pack_default(project.path(), &["."]).await;
        assert!(!plain.contains(DEFAULT_BUNDLE_FILE_NAME));
    }

    #[compio::test]
    async fn config_file_and_configured_bundle_are_not_embedded() {
        let project = project();
        write(
            project.path(),
            "embed.yaml",
            "patterns:\n  - \"all:.\"\nbundle: dist/app.bundle\n",
        );

        for _ in 0..2 {
            Application::run(runtime(
                project.path(),
                Command::Pack {
                    patterns: Vec::new(),
                    output: None,
                },
            ))
            .await
            .unwrap();
        }

        let bytes = std::fs::read(project.path().join("dist/app.bundle")).unwrap();
        let set = VirtualFileSet::from_bundle(&bytes).unwrap();
        assert_eq!(set.len(), 4);
        assert!(!set.contains("embed.yaml"));
        assert!(!set.contains("dist/app.bundle"));
    }

    #[cfg(unix)]
    #[compio::test]
    async fn unrelated_subtrees_do_not_affect_resolution() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let project = project();
        std::fs::create_dir_all(project.path().join("target")).unwrap();
        std::fs::write(
            project.path().join("target").join(OsStr::from_bytes(b"\xff.o")),
            "obj",
        )
        .unwrap();

        let result = Application::run(runtime(
            project.path(),
            Command::List {
                patterns: vec!["parent_dir".into()],
                prefix: None,
                long: false,
            },
        ))
        .await;

        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn excluded_paths_are_relative_to_root() {
        let root = Path::new("project");
        let excluded =
            Application::excluded_paths(root, &root.join("out").join("site.bundle"));
        assert_eq!(
            excluded,
            HashSet::from(["embed.yaml".to_string(), "out/site.bundle".to_string()])
        );

        let outside = Application::excluded_paths(root, Path::new("/elsewhere/site.bundle"));
        assert_eq!(outside, HashSet::from(["embed.yaml".to_string()]));
    }

    #[test]
    fn command_line_patterns_override_config() {
        let config = EmbedConfig {
            patterns: vec![InclusionPattern::PlainRoot("configured".into())],
            bundle: None,
        };

        let selected =
            Application::select_patterns(&["all:given".to_string()], &config).unwrap();
        assert_eq!(selected, vec![InclusionPattern::AllRecursive("given".into())]);

        let fallback = Application::select_patterns(&[], &config).unwrap();
        assert_eq!(fallback, config.patterns);
    }

    #[test]
    fn bad_command_line_pattern_is_rejected() {
        let result = Application::select_patterns(&["/abs".to_string()], &EmbedConfig::default());
        assert!(matches!(result, Err(ApplicationError::PatternError { .. })));
    }
}
