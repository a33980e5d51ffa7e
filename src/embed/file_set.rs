use std::hash::Hasher;

use hashlink::LinkedHashMap;
use metrohash::MetroHash64;
use snafu::Snafu;

use crate::filesystem::{ROOT, is_within, traversal_cmp, validate_relative_path};

/// Content of one embedded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedFile {
    contents: Vec<u8>,
    digest: u64,
}

impl EmbeddedFile {
    pub fn new(contents: Vec<u8>) -> Self {
        let digest = digest_of(&contents);
        Self { contents, digest }
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// MetroHash64 of the contents, computed when the file was embedded.
    pub fn digest(&self) -> u64 {
        self.digest
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

pub(crate) fn digest_of(contents: &[u8]) -> u64 {
    let mut hasher = MetroHash64::default();
    hasher.write(contents);
    hasher.finish()
}

/// One entry of [`VirtualFileSet::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry<'a> {
    pub name: &'a str,
    pub is_dir: bool,
}

/// A read-only set of embedded files keyed by slash-separated path.
///
/// Files are kept in traversal order (depth-first, siblings sorted by name),
/// which is also the order every listing method yields. Directories exist
/// only as path prefixes and carry no content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualFileSet {
    files: LinkedHashMap<String, EmbeddedFile>,
}

impl VirtualFileSet {
    /// Builds a set from files that are already unique and in traversal order.
    pub(crate) fn from_ordered(files: impl IntoIterator<Item = (String, EmbeddedFile)>) -> Self {
        Self {
            files: files.into_iter().collect(),
        }
    }

    /// Returns the contents of the file at `path`.
    pub fn open(&self, path: &str) -> Result<&[u8], QueryError> {
        self.get(path).map(EmbeddedFile::contents)
    }

    /// Returns the file at `path` together with its digest.
    pub fn get(&self, path: &str) -> Result<&EmbeddedFile, QueryError> {
        validate_query(path)?;
        if let Some(file) = self.files.get(path) {
            return Ok(file);
        }
        if self.is_dir(path) {
            IsDirectorySnafu { path }.fail()
        } else {
            NotFoundSnafu { path }.fail()
        }
    }

    /// Lists the paths at or below `prefix`, in traversal order.
    ///
    /// Matching is done per segment: `a` covers `a` and `a/...` but not `ab`.
    /// An empty prefix or `.` covers the whole set. Each call starts a fresh
    /// iteration.
    pub fn list<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        let everything = prefix.is_empty() || prefix == ROOT;
        // Everything under `prefix` is contiguous in traversal order.
        self.files
            .keys()
            .map(String::as_str)
            .skip_while(move |path| !everything && traversal_cmp(path, prefix).is_lt())
            .take_while(move |path| is_within(path, prefix))
    }

    /// Lists the immediate children of the directory `dir`, sorted by name.
    pub fn read_dir<'a>(&'a self, dir: &'a str) -> Result<Vec<DirEntry<'a>>, QueryError> {
        validate_query(dir)?;
        if self.files.contains_key(dir) {
            return NotADirectorySnafu { path: dir }.fail();
        }

        let mut entries: Vec<DirEntry<'a>> = Vec::new();
        for path in self.list(dir) {
            let rest = if dir == ROOT {
                path
            } else {
                &path[dir.len() + 1..]
            };
            let (name, is_dir) = match rest.split_once('/') {
                Some((name, _)) => (name, true),
                None => (rest, false),
            };
            if entries.last().is_none_or(|last| last.name != name) {
                entries.push(DirEntry { name, is_dir });
            }
        }

        if entries.is_empty() && dir != ROOT {
            return NotFoundSnafu { path: dir }.fail();
        }
        Ok(entries)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Whether `path` is a directory implied by the paths in the set.
    pub fn is_dir(&self, path: &str) -> bool {
        // The first path sorting after `path` is below it if anything is.
        path == ROOT
            || self
                .files
                .keys()
                .find(|file| traversal_cmp(file, path).is_gt())
                .is_some_and(|file| is_within(file, path))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EmbeddedFile)> {
        self.files.iter().map(|(path, file)| (path.as_str(), file))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total size of all embedded contents in bytes.
    pub fn total_size(&self) -> usize {
        self.files.values().map(EmbeddedFile::len).sum()
    }
}

fn validate_query(path: &str) -> Result<(), QueryError> {
    validate_relative_path(path).map_err(|reason| QueryError::InvalidPath {
        path: path.to_string(),
        reason,
    })
}

#[derive(Debug, Snafu)]
pub enum QueryError {
    #[snafu(display("No embedded file at '{}'", path))]
    NotFound { path: String },
    #[snafu(display("'{}' is an embedded directory, not a file", path))]
    IsDirectory { path: String },
    #[snafu(display("'{}' is an embedded file, not a directory", path))]
    NotADirectory { path: String },
    #[snafu(display("Invalid embedded path '{}': {}", path, reason))]
    InvalidPath { path: String, reason: &'static str },
}
