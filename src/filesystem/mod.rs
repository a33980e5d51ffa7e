//! Directory tree representation consumed by the embedding resolver.
//!
//! A tree can be assembled in memory, one file at a time, or captured as a
//! snapshot of a real directory. Either way, paths are slash-separated and
//! relative, and `.` names the root of the tree.

mod snapshot;
mod tree;

use std::cmp::Ordering;

pub use snapshot::SnapshotError;
pub use tree::{DirectoryTree, TreeError, TreeNode};

/// Name of the tree root in slash-separated paths.
pub const ROOT: &str = ".";

/// Entries whose name starts with `.` or `_` are hidden.
pub fn is_hidden(name: &str) -> bool {
    name.starts_with('.') || name.starts_with('_')
}

/// Checks that `path` is a relative, slash-separated path without empty,
/// `.` or `..` segments. The bare root `.` is accepted.
///
/// On failure the reason is returned so callers can wrap it in their own
/// error type.
pub fn validate_relative_path(path: &str) -> Result<(), &'static str> {
    if path == ROOT {
        return Ok(());
    }
    if path.is_empty() {
        return Err("path is empty");
    }
    if path.starts_with('/') {
        return Err("path must be relative");
    }
    if path.contains('\\') {
        return Err("path must use forward slashes");
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err("path contains an empty segment"),
            "." | ".." => return Err("path contains a '.' or '..' segment"),
            _ => {}
        }
    }
    Ok(())
}

/// Splits a validated path into its segments. The root has none.
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| *segment != ROOT)
}

/// Appends `name` to `parent`, treating `.` as the empty prefix.
pub fn join(parent: &str, name: &str) -> String {
    if parent == ROOT {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

/// Whether `path` is `ancestor` itself or lies below it. Matching is per
/// segment, and an empty `ancestor` or `.` covers every path.
pub fn is_within(path: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() || ancestor == ROOT {
        return true;
    }
    path.strip_prefix(ancestor)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Orders paths the way a depth-first pre-order walk with name-sorted
/// siblings visits them: segment by segment rather than byte by byte.
///
/// `a/b` sorts before `a.txt` here because the directory `a` sorts before
/// the file `a.txt`.
pub fn traversal_cmp(a: &str, b: &str) -> Ordering {
    a.split('/').cmp(b.split('/'))
}
