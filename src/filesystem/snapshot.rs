use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use compio::fs;
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::{debug, trace, warn};
use walkdir::WalkDir;

use super::{DirectoryTree, ROOT, TreeError, is_within, join, traversal_cmp};
use crate::ext::BestEffortPathExt;

impl DirectoryTree {
    /// Captures the whole directory at `dir` as an in-memory tree.
    pub async fn snapshot(dir: &Path) -> Result<Self, SnapshotError> {
        Self::snapshot_selected(dir, [ROOT], &HashSet::new()).await
    }

    /// Captures only the subtrees of `dir` named by `roots`.
    ///
    /// Roots are slash-separated paths relative to `dir`. A root that does
    /// not exist on disk is left out of the tree, so resolving against it
    /// reports the missing path. Entries whose tree path is in `excluded`
    /// are skipped along with everything below them.
    ///
    /// Directory listings come from a synchronous `walkdir` pass and file
    /// contents are read through `compio::fs`. Symlinks and other irregular
    /// files are skipped. Any I/O failure aborts the snapshot.
    pub async fn snapshot_selected<'a>(
        dir: &Path,
        roots: impl IntoIterator<Item = &'a str>,
        excluded: &HashSet<String>,
    ) -> Result<Self, SnapshotError> {
        debug!("Taking snapshot of {}", dir.best_effort_path_display());
        let metadata = fs::metadata(dir).await.context(IoSnafu { path: dir })?;
        ensure!(metadata.is_dir(), NotADirectorySnafu { path: dir });

        let mut roots: Vec<&str> = roots.into_iter().collect();
        roots.sort_by(|a, b| traversal_cmp(a, b));
        roots.dedup_by(|nested, outer| is_within(nested, outer));

        let mut tree = DirectoryTree::new();
        let mut file_count = 0usize;
        for root in roots {
            file_count += tree.capture(dir, root, excluded).await?;
        }

        debug!("Snapshot holds {file_count} files");
        Ok(tree)
    }

    async fn capture(
        &mut self,
        dir: &Path,
        root: &str,
        excluded: &HashSet<String>,
    ) -> Result<usize, SnapshotError> {
        if excluded.contains(root) {
            trace!("Skipping excluded root {root}");
            return Ok(0);
        }
        let disk_root = if root == ROOT {
            dir.to_path_buf()
        } else {
            dir.join(root)
        };
        let metadata = match fs::symlink_metadata(&disk_root).await {
            Ok(metadata) => metadata,
            Err(err) if matches!(err.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                debug!("Root {root} does not exist on disk");
                return Ok(0);
            }
            Err(source) => return Err(SnapshotError::Io { path: disk_root, source }),
        };

        if metadata.is_file() {
            let contents = fs::read(&disk_root).await.context(IoSnafu { path: &disk_root })?;
            self.insert_file(root, contents).context(TreeSnafu)?;
            return Ok(1);
        }
        if !metadata.is_dir() {
            warn!("Skipping irregular root {}", disk_root.best_effort_path_display());
            return Ok(0);
        }
        self.insert_dir(root).context(TreeSnafu)?;

        let mut file_count = 0usize;
        let mut names: Vec<String> = Vec::new();
        let mut entries = WalkDir::new(&disk_root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = entry.context(WalkSnafu)?;
            let name = entry
                .file_name()
                .to_str()
                .context(NonUtf8NameSnafu { path: entry.path() })?;
            names.truncate(entry.depth() - 1);
            names.push(name.to_string());
            let tree_path = join(root, &names.join("/"));

            let file_type = entry.file_type();
            if excluded.contains(&tree_path) {
                trace!("Skipping excluded {tree_path}");
                if file_type.is_dir() {
                    entries.skip_current_dir();
                }
            } else if file_type.is_dir() {
                self.insert_dir(&tree_path).context(TreeSnafu)?;
            } else if file_type.is_file() {
                let contents = fs::read(entry.path())
                    .await
                    .context(IoSnafu { path: entry.path() })?;
                self.insert_file(&tree_path, contents).context(TreeSnafu)?;
                file_count += 1;
            } else {
                warn!(
                    "Skipping irregular file {}",
                    entry.path().best_effort_path_display()
                );
            }
        }
        Ok(file_count)
    }
}

#[derive(Debug, Snafu)]
pub enum SnapshotError {
    #[snafu(display("Failed to read {}", path.best_effort_path_display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("Failed to walk the directory tree"))]
    Walk { source: walkdir::Error },
    #[snafu(display("File name is not valid UTF-8: {}", path.best_effort_path_display()))]
    NonUtf8Name { path: PathBuf },
    #[snafu(display("{} is not a directory", path.best_effort_path_display()))]
    NotADirectory { path: PathBuf },
    #[snafu(display("Failed to add an entry to the snapshot"))]
    Tree { source: TreeError },
}
