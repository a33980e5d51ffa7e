use std::collections::BTreeMap;

use snafu::Snafu;

use super::{ROOT, segments, validate_relative_path};

/// A node of a [`DirectoryTree`].
///
/// Children are kept in a `BTreeMap` so that iterating a directory yields
/// its entries sorted by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    File { contents: Vec<u8> },
    Directory { children: BTreeMap<String, TreeNode> },
}

impl TreeNode {
    fn empty_directory() -> Self {
        TreeNode::Directory {
            children: BTreeMap::new(),
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, TreeNode::Directory { .. })
    }
}

/// An enumerable snapshot of a directory hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTree {
    root: TreeNode,
}

impl Default for DirectoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryTree {
    pub fn new() -> Self {
        Self {
            root: TreeNode::empty_directory(),
        }
    }

    /// Builds a tree from `(path, contents)` pairs.
    pub fn from_files<P, C>(files: impl IntoIterator<Item = (P, C)>) -> Result<Self, TreeError>
    where
        P: AsRef<str>,
        C: Into<Vec<u8>>,
    {
        files
            .into_iter()
            .try_fold(Self::new(), |mut tree, (path, contents)| {
                tree.insert_file(path.as_ref(), contents)?;
                Ok(tree)
            })
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Inserts a file, creating intermediate directories as needed.
    /// An existing file at `path` is replaced.
    pub fn insert_file(
        &mut self,
        path: &str,
        contents: impl Into<Vec<u8>>,
    ) -> Result<(), TreeError> {
        if path == ROOT {
            return Err(TreeError::InvalidPath {
                path: path.to_string(),
                reason: "the tree root cannot be a file",
            });
        }
        let parent = self.parent_children(path)?;
        let name = last_segment(path);
        match parent.get(name) {
            Some(TreeNode::Directory { .. }) => Err(TreeError::CannotInsertIntoFile {
                path: path.to_string(),
            }),
            _ => {
                parent.insert(
                    name.to_string(),
                    TreeNode::File {
                        contents: contents.into(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Inserts an empty directory, creating intermediate directories as
    /// needed. Inserting an existing directory is a no-op.
    pub fn insert_dir(&mut self, path: &str) -> Result<(), TreeError> {
        validate(path)?;
        let mut current = &mut self.root;
        for name in segments(path) {
            current = match current {
                TreeNode::Directory { children } => children
                    .entry(name.to_string())
                    .or_insert_with(TreeNode::empty_directory),
                TreeNode::File { .. } => {
                    return Err(TreeError::CannotInsertIntoFile {
                        path: path.to_string(),
                    });
                }
            };
        }
        match current {
            TreeNode::Directory { .. } => Ok(()),
            TreeNode::File { .. } => Err(TreeError::CannotInsertIntoFile {
                path: path.to_string(),
            }),
        }
    }

    /// Looks up the node at `path`. `.` returns the root.
    pub fn get(&self, path: &str) -> Option<&TreeNode> {
        validate_relative_path(path).ok()?;
        segments(path).try_fold(&self.root, |node, name| match node {
            TreeNode::Directory { children } => children.get(name),
            TreeNode::File { .. } => None,
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Walks to the parent directory of `path`, creating it if needed, and
    /// returns its children.
    fn parent_children(
        &mut self,
        path: &str,
    ) -> Result<&mut BTreeMap<String, TreeNode>, TreeError> {
        validate(path)?;
        let parent = path.rsplit_once('/').map_or(ROOT, |(parent, _)| parent);
        let mut current = &mut self.root;

        for name in segments(parent) {
            current = match current {
                TreeNode::Directory { children } => children
                    .entry(name.to_string())
                    .or_insert_with(TreeNode::empty_directory),
                TreeNode::File { .. } => {
                    return Err(TreeError::CannotInsertIntoFile {
                        path: path.to_string(),
                    });
                }
            };
        }

        match current {
            TreeNode::Directory { children } => Ok(children),
            TreeNode::File { .. } => Err(TreeError::CannotInsertIntoFile {
                path: path.to_string(),
            }),
        }
    }
}

fn validate(path: &str) -> Result<(), TreeError> {
    validate_relative_path(path).map_err(|reason| TreeError::InvalidPath {
        path: path.to_string(),
        reason,
    })
}

fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[derive(Debug, Snafu)]
pub enum TreeError {
    #[snafu(display("Cannot insert '{}': a file is in the way", path))]
    CannotInsertIntoFile { path: String },
    #[snafu(display("Invalid tree path '{}': {}", path, reason))]
    InvalidPath { path: String, reason: &'static str },
}
