//! Selective file embedding.
//!
//! Resolves embedding directives (`dir`, `dir/*`, `all:dir`) against a
//! directory tree into an immutable [`VirtualFileSet`](embed::VirtualFileSet),
//! and packs such sets into bundles a program can ship and load at start-up.
//!
//! ```
//! use embedset::embed::{InclusionPattern, resolve};
//! use embedset::filesystem::DirectoryTree;
//!
//! let tree = DirectoryTree::from_files([
//!     ("static/.env", "SECRET=1"),
//!     ("static/index.html", "<html></html>"),
//! ])
//! .unwrap();
//!
//! let set = resolve(&"static".parse::<InclusionPattern>().unwrap(), &tree).unwrap();
//! assert_eq!(set.list("").collect::<Vec<_>>(), vec!["static/index.html"]);
//! assert!(set.open("static/.env").is_err());
//! ```

pub mod application;
pub mod cli;
pub mod config;
pub mod embed;
pub mod ext;
pub mod filesystem;
