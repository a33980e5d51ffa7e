//! Resolution of embedding directives into read-only file sets.
//!
//! A directive names a root path in a [`DirectoryTree`](crate::filesystem::DirectoryTree)
//! and, through its form, how hidden entries (names starting with `.` or `_`)
//! are treated:
//!
//! | form      | hidden entries kept                        |
//! |-----------|--------------------------------------------|
//! | `dir`     | none                                       |
//! | `dir/*`   | those directly under `dir`                 |
//! | `all:dir` | all of them                                |
//!
//! The result is a [`VirtualFileSet`], which can also be shipped as a
//! compressed bundle.

mod bundle;
mod file_set;
mod pattern;
mod resolver;

pub use bundle::{BundleError, MAX_BUNDLE_BYTES};
pub use file_set::{DirEntry, EmbeddedFile, QueryError, VirtualFileSet};
pub use pattern::{InclusionPattern, PatternError};
pub use resolver::{PathEntry, ResolveError, resolve, resolve_all};
