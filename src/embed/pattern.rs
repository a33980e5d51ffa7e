use std::str::FromStr;

use derive_more::Display;
use snafu::Snafu;

use crate::filesystem::{ROOT, validate_relative_path};

use super::PathEntry;

const ALL_PREFIX: &str = "all:";
const GLOB_STAR_SUFFIX: &str = "/*";

/// An embedding directive: a root path plus the rule deciding which hidden
/// entries below it are kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub enum InclusionPattern {
    /// `dir`: hidden entries are excluded at every depth.
    #[display("{_0}")]
    PlainRoot(String),
    /// `dir/*`: hidden entries directly under the root are kept, deeper
    /// ones are excluded.
    #[display("{_0}/*")]
    GlobStar(String),
    /// `all:dir`: every entry is kept.
    #[display("all:{_0}")]
    AllRecursive(String),
}

impl InclusionPattern {
    /// Parses the directive syntax. `all:` wins over a trailing `/*`.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let (all, rest) = match pattern.strip_prefix(ALL_PREFIX) {
            Some(rest) => (true, rest),
            None => (false, pattern),
        };
        let (glob, root) = match rest.strip_suffix(GLOB_STAR_SUFFIX) {
            Some(root) => (true, root),
            None if rest == "*" => (true, ROOT),
            None => (false, rest),
        };

        validate_root(pattern, root)?;

        let root = root.to_string();
        Ok(match (all, glob) {
            (true, _) => InclusionPattern::AllRecursive(root),
            (false, true) => InclusionPattern::GlobStar(root),
            (false, false) => InclusionPattern::PlainRoot(root),
        })
    }

    pub fn root(&self) -> &str {
        match self {
            InclusionPattern::PlainRoot(root)
            | InclusionPattern::GlobStar(root)
            | InclusionPattern::AllRecursive(root) => root,
        }
    }

    /// Decides whether `entry`, found below this pattern's root, is part of
    /// the embedded set. A directory that is not admitted contributes nothing.
    pub fn admits(&self, entry: &PathEntry) -> bool {
        match self {
            InclusionPattern::PlainRoot(_) => !entry.is_hidden,
            InclusionPattern::GlobStar(_) => entry.depth == 1 || !entry.is_hidden,
            InclusionPattern::AllRecursive(_) => true,
        }
    }

    /// Whether the root itself must be a directory for the pattern to match.
    pub(crate) fn requires_directory_root(&self) -> bool {
        matches!(self, InclusionPattern::GlobStar(_))
    }
}

impl FromStr for InclusionPattern {
    type Err = PatternError;

    fn from_str(pattern: &str) -> Result<Self, Self::Err> {
        Self::parse(pattern)
    }
}

fn validate_root(pattern: &str, root: &str) -> Result<(), PatternError> {
    if root.contains(['*', '?', '[']) {
        return Err(PatternError::AmbiguousPattern {
            pattern: pattern.to_string(),
            reason: "only a single trailing '/*' glob is supported",
        });
    }
    validate_relative_path(root).map_err(|reason| PatternError::AmbiguousPattern {
        pattern: pattern.to_string(),
        reason,
    })
}

#[derive(Debug, Snafu)]
pub enum PatternError {
    #[snafu(display("Unrecognized embed pattern '{}': {}", pattern, reason))]
    AmbiguousPattern {
        pattern: String,
        reason: &'static str,
    },
}
