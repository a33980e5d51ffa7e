use snafu::{Snafu, ensure};
use tracing::{debug, trace};

use crate::filesystem::{DirectoryTree, TreeNode, is_hidden, join, traversal_cmp};

use super::{EmbeddedFile, InclusionPattern, VirtualFileSet};

/// An entry met while walking below a pattern's root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub path: String,
    pub is_dir: bool,
    pub is_hidden: bool,
    /// The root is depth 0; its immediate children are depth 1.
    pub depth: usize,
}

/// Resolves a single pattern against `tree`.
///
/// The walk is depth-first, pre-order, with siblings in name order. A
/// directory the pattern does not admit is not descended into, so it
/// contributes no entries, while its siblings are still visited. The root
/// itself is never filtered, so naming a hidden path explicitly embeds it.
pub fn resolve(
    pattern: &InclusionPattern,
    tree: &DirectoryTree,
) -> Result<VirtualFileSet, ResolveError> {
    let files = collect(pattern, tree)?;
    debug!("Pattern '{pattern}' resolved to {} files", files.len());
    Ok(VirtualFileSet::from_ordered(files))
}

/// Resolves every pattern and returns their union.
///
/// A path matched by several patterns appears once. The result is in
/// traversal order regardless of the order of `patterns`. If any pattern
/// fails the whole call fails.
pub fn resolve_all<'a>(
    patterns: impl IntoIterator<Item = &'a InclusionPattern>,
    tree: &DirectoryTree,
) -> Result<VirtualFileSet, ResolveError> {
    let mut files = Vec::new();
    for pattern in patterns {
        files.extend(collect(pattern, tree)?);
    }

    files.sort_by(|(a, _), (b, _)| traversal_cmp(a, b));
    files.dedup_by(|(a, _), (b, _)| a == b);
    debug!("Patterns resolved to {} distinct files", files.len());

    Ok(VirtualFileSet::from_ordered(files))
}

fn collect(
    pattern: &InclusionPattern,
    tree: &DirectoryTree,
) -> Result<Vec<(String, EmbeddedFile)>, ResolveError> {
    let root = pattern.root();
    let node = tree.get(root).ok_or_else(|| ResolveError::PathNotFound {
        root: root.to_string(),
    })?;
    ensure!(
        node.is_dir() || !pattern.requires_directory_root(),
        NoMatchingFilesSnafu {
            pattern: pattern.to_string()
        }
    );

    let mut files = Vec::new();
    walk(pattern, root, node, 0, &mut files);
    ensure!(
        !files.is_empty(),
        NoMatchingFilesSnafu {
            pattern: pattern.to_string()
        }
    );

    Ok(files)
}

fn walk(
    pattern: &InclusionPattern,
    path: &str,
    node: &TreeNode,
    depth: usize,
    files: &mut Vec<(String, EmbeddedFile)>,
) {
    match node {
        TreeNode::File { contents } => {
            files.push((path.to_string(), EmbeddedFile::new(contents.clone())));
        }
        TreeNode::Directory { children } => {
            for (name, child) in children {
                let entry = PathEntry {
                    path: join(path, name),
                    is_dir: child.is_dir(),
                    is_hidden: is_hidden(name),
                    depth: depth + 1,
                };
                if pattern.admits(&entry) {
                    walk(pattern, &entry.path, child, entry.depth, files);
                } else if entry.is_dir {
                    trace!("Skipping hidden directory {}", entry.path);
                }
            }
        }
    }
}

#[derive(Debug, Snafu)]
pub enum ResolveError {
    #[snafu(display("Pattern root '{}' does not exist", root))]
    PathNotFound { root: String },
    #[snafu(display("Pattern '{}' matches no embeddable files", pattern))]
    NoMatchingFiles { pattern: String },
}

impl ResolveError {
    pub fn is_path_not_found(&self) -> bool {
        matches!(self, ResolveError::PathNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn scenario() -> DirectoryTree {
        DirectoryTree::from_files([
            ("parent_dir/.hidden", "top hidden"),
            ("parent_dir/visible", "top visible"),
            ("parent_dir/child_dir/.hidden", "nested hidden"),
            ("parent_dir/child_dir/visible", "nested visible"),
        ])
        .unwrap()
    }

    fn paths(set: &VirtualFileSet) -> Vec<&str> {
        set.list("").collect()
    }

    fn pattern(input: &str) -> InclusionPattern {
        InclusionPattern::parse(input).unwrap()
    }

    #[rstest]
    #[case("parent_dir", vec!["parent_dir/child_dir/visible", "parent_dir/visible"])]
    #[case("parent_dir/*", vec![
        "parent_dir/.hidden",
        "parent_dir/child_dir/visible",
        "parent_dir/visible",
    ])]
    #[case("all:parent_dir", vec![
        "parent_dir/.hidden",
        "parent_dir/child_dir/.hidden",
        "parent_dir/child_dir/visible",
        "parent_dir/visible",
    ])]
    fn resolves_hidden_file_scenario(
        scenario: DirectoryTree,
        #[case] input: &str,
        #[case] expected: Vec<&str>,
    ) {
        let set = resolve(&pattern(input), &scenario).unwrap();
        assert_eq!(paths(&set), expected);
    }

    #[rstest]
    fn missing_root_is_path_not_found(scenario: DirectoryTree) {
        let result = resolve(&pattern("missing_dir"), &scenario);
        assert!(matches!(
            result,
            Err(ResolveError::PathNotFound { ref root }) if root == "missing_dir"
        ));
    }

    #[rstest]
    fn contents_are_carried_over(scenario: DirectoryTree) {
        let set = resolve(&pattern("all:parent_dir"), &scenario).unwrap();
        assert_eq!(
            set.open("parent_dir/child_dir/.hidden").unwrap(),
            b"nested hidden"
        );
    }

    #[rstest]
    #[case("parent_dir")]
    #[case("parent_dir/*")]
    #[case("all:parent_dir")]
    fn resolution_is_deterministic(scenario: DirectoryTree, #[case] input: &str) {
        let first = resolve(&pattern(input), &scenario).unwrap();
        let second = resolve(&pattern(input), &scenario).unwrap();
        assert_eq!(first, second);
        assert_eq!(paths(&first), paths(&second));
    }

    /// A hidden directory sorting before its siblings must not stop the walk.
    fn hidden_directory_first() -> DirectoryTree {
        DirectoryTree::from_files([
            ("root/.git/config", "cfg"),
            ("root/.git/objects/pack", "pack"),
            ("root/_build/out", "out"),
            ("root/src/_gen/code", "gen"),
            ("root/src/main", "main"),
            ("root/zeta", "z"),
        ])
        .unwrap()
    }

    #[rstest]
    #[case("root", vec!["root/src/main", "root/zeta"])]
    #[case("root/*", vec![
        "root/.git/config",
        "root/.git/objects/pack",
        "root/_build/out",
        "root/src/main",
        "root/zeta",
    ])]
    #[case("all:root", vec![
        "root/.git/config",
        "root/.git/objects/pack",
        "root/_build/out",
        "root/src/_gen/code",
        "root/src/main",
        "root/zeta",
    ])]
    fn hidden_directories_are_skipped_but_siblings_continue(
        #[case] input: &str,
        #[case] expected: Vec<&str>,
    ) {
        let tree = hidden_directory_first();
        let set = resolve(&pattern(input), &tree).unwrap();
        assert_eq!(paths(&set), expected);
    }

    #[test]
    fn plain_root_never_yields_hidden_segments() {
        let tree = hidden_directory_first();
        let set = resolve(&pattern("root"), &tree).unwrap();
        for path in set.list("") {
            assert!(
                path.split('/').skip(1).all(|segment| !is_hidden(segment)),
                "{path} has a hidden segment"
            );
        }
    }

    #[test]
    fn hidden_root_named_explicitly_is_embedded() {
        let tree = DirectoryTree::from_files([
            (".config/settings", "s"),
            (".config/.secret", "x"),
        ])
        .unwrap();
        let set = resolve(&pattern(".config"), &tree).unwrap();
        assert_eq!(paths(&set), vec![".config/settings"]);
    }

    #[test]
    fn file_root_embeds_that_file() {
        let tree = DirectoryTree::from_files([("dir/_hidden.txt", "h")]).unwrap();
        let set = resolve(&pattern("dir/_hidden.txt"), &tree).unwrap();
        assert_eq!(paths(&set), vec!["dir/_hidden.txt"]);
    }

    #[test]
    fn glob_star_on_a_file_matches_nothing() {
        let tree = DirectoryTree::from_files([("file.txt", "x")]).unwrap();
        assert!(matches!(
            resolve(&pattern("file.txt/*"), &tree),
            Err(ResolveError::NoMatchingFiles { .. })
        ));
    }

    #[test]
    fn directory_with_only_hidden_files_matches_nothing() {
        let tree = DirectoryTree::from_files([("dir/.only", "x")]).unwrap();
        assert!(matches!(
            resolve(&pattern("dir"), &tree),
            Err(ResolveError::NoMatchingFiles { .. })
        ));
        assert!(resolve(&pattern("dir/*"), &tree).is_ok());
    }

    #[test]
    fn tree_root_patterns() {
        let tree = DirectoryTree::from_files([(".env", "e"), ("app/main", "m")]).unwrap();
        assert_eq!(
            paths(&resolve(&pattern("."), &tree).unwrap()),
            vec!["app/main"]
        );
        assert_eq!(
            paths(&resolve(&pattern("*"), &tree).unwrap()),
            vec![".env", "app/main"]
        );
    }

    #[rstest]
    fn union_is_deduplicated_and_ordered(scenario: DirectoryTree) {
        let patterns = [
            pattern("parent_dir/child_dir"),
            pattern("parent_dir/*"),
            pattern("parent_dir"),
        ];
        let set = resolve_all(&patterns, &scenario).unwrap();
        assert_eq!(
            paths(&set),
            vec![
                "parent_dir/.hidden",
                "parent_dir/child_dir/visible",
                "parent_dir/visible",
            ]
        );
    }

    #[rstest]
    fn union_fails_as_a_whole(scenario: DirectoryTree) {
        let patterns = [pattern("parent_dir"), pattern("missing_dir")];
        let result = resolve_all(&patterns, &scenario);
        assert!(result.is_err_and(|err| err.is_path_not_found()));
    }

    #[test]
    fn union_of_nothing_is_empty() {
        let tree = DirectoryTree::new();
        let patterns: Vec<InclusionPattern> = Vec::new();
        let set = resolve_all(&patterns, &tree).unwrap();
        assert!(set.is_empty());
    }
}
