//! Serialized form of a [`VirtualFileSet`].
//!
//! Layout: the magic `EMBS`, one format version byte, then a zstd frame
//! holding the bincode-encoded file records in traversal order.

use std::collections::HashSet;
use std::io::Read;

use bincode::{Decode, Encode};
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use tracing::debug;

use crate::filesystem::{ROOT, is_within, traversal_cmp, validate_relative_path};

use super::file_set::digest_of;
use super::{EmbeddedFile, VirtualFileSet};

const MAGIC: &[u8; 4] = b"EMBS";
const FORMAT_VERSION: u8 = 1;
const COMPRESSION_LEVEL: i32 = 3;

/// Largest decompressed payload [`VirtualFileSet::from_bundle`] accepts.
pub const MAX_BUNDLE_BYTES: u64 = 1 << 30;

#[derive(Debug, Encode, Decode)]
struct BundleRecord {
    path: String,
    digest: u64,
    contents: Vec<u8>,
}

impl VirtualFileSet {
    /// Encodes the set into a self-describing, compressed bundle.
    pub fn to_bundle(&self) -> Result<Vec<u8>, BundleError> {
        let records: Vec<BundleRecord> = self
            .iter()
            .map(|(path, file)| BundleRecord {
                path: path.to_string(),
                digest: file.digest(),
                contents: file.contents().to_vec(),
            })
            .collect();

        let encoded =
            bincode::encode_to_vec(&records, bincode::config::standard()).context(EncodeSnafu)?;
        let compressed =
            zstd::encode_all(encoded.as_slice(), COMPRESSION_LEVEL).context(CompressionSnafu)?;

        let mut bundle = Vec::with_capacity(MAGIC.len() + 1 + compressed.len());
        bundle.extend_from_slice(MAGIC);
        bundle.push(FORMAT_VERSION);
        bundle.extend_from_slice(&compressed);
        debug!(
            "Encoded {} files ({} bytes) into a {} byte bundle",
            self.len(),
            self.total_size(),
            bundle.len()
        );
        Ok(bundle)
    }

    /// Decodes a bundle produced by [`VirtualFileSet::to_bundle`].
    ///
    /// Every file's digest is checked against its contents, and the set is
    /// rejected if a path is malformed, two records share a path, a file
    /// also appears as a directory, or the records are out of traversal
    /// order. The payload may decompress to at most [`MAX_BUNDLE_BYTES`].
    pub fn from_bundle(bundle: &[u8]) -> Result<Self, BundleError> {
        Self::from_bundle_with_limit(bundle, MAX_BUNDLE_BYTES)
    }

    /// Like [`VirtualFileSet::from_bundle`], with a custom bound on the
    /// decompressed payload size.
    pub fn from_bundle_with_limit(bundle: &[u8], limit: u64) -> Result<Self, BundleError> {
        let payload = bundle.strip_prefix(MAGIC.as_slice()).context(BadMagicSnafu)?;
        let (&version, compressed) = payload.split_first().context(BadMagicSnafu)?;
        ensure!(
            version == FORMAT_VERSION,
            UnsupportedVersionSnafu { version }
        );

        let encoded = decompress(compressed, limit)?;
        let (records, _): (Vec<BundleRecord>, usize) =
            bincode::decode_from_slice(&encoded, bincode::config::standard())
                .context(DecodeSnafu)?;

        validate_records(&records)?;

        debug!("Decoded {} files from bundle", records.len());
        Ok(Self::from_ordered(records.into_iter().map(|record| {
            (record.path, EmbeddedFile::new(record.contents))
        })))
    }
}

fn decompress(compressed: &[u8], limit: u64) -> Result<Vec<u8>, BundleError> {
    let decoder = zstd::stream::read::Decoder::new(compressed).context(CompressionSnafu)?;
    let mut encoded = Vec::new();
    decoder
        .take(limit.saturating_add(1))
        .read_to_end(&mut encoded)
        .context(CompressionSnafu)?;
    ensure!(encoded.len() as u64 <= limit, TooLargeSnafu { limit });
    Ok(encoded)
}

fn validate_records(records: &[BundleRecord]) -> Result<(), BundleError> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut previous: Option<&str> = None;
    for record in records {
        let path = record.path.as_str();
        if let Err(reason) = validate_relative_path(path) {
            return InvalidPathSnafu { path, reason }.fail();
        }
        ensure!(
            path != ROOT,
            InvalidPathSnafu {
                path,
                reason: "the root cannot be a file"
            }
        );
        ensure!(
            seen.insert(record.path.as_str()),
            DuplicatePathSnafu {
                path: record.path.as_str()
            }
        );
        ensure!(
            previous.is_none_or(|previous| traversal_cmp(previous, &record.path).is_lt()),
            OutOfOrderSnafu {
                path: record.path.as_str()
            }
        );
        // Descendants of a path sort directly after it.
        ensure!(
            previous.is_none_or(|previous| !is_within(path, previous)),
            FileUsedAsDirectorySnafu { path }
        );
        ensure!(
            digest_of(&record.contents) == record.digest,
            DigestMismatchSnafu {
                path: record.path.as_str()
            }
        );
        previous = Some(&record.path);
    }
    Ok(())
}

#[derive(Debug, Snafu)]
pub enum BundleError {
    #[snafu(display("Failed to encode bundle"))]
    Encode { source: bincode::error::EncodeError },
    #[snafu(display("Failed to decode bundle"))]
    Decode { source: bincode::error::DecodeError },
    #[snafu(display("Failed to (de)compress bundle"))]
    Compression { source: std::io::Error },
    #[snafu(display("Not an embed bundle"))]
    BadMagic,
    #[snafu(display("Unsupported bundle format version {}", version))]
    UnsupportedVersion { version: u8 },
    #[snafu(display("Bundle entry '{}' does not match its digest", path))]
    DigestMismatch { path: String },
    #[snafu(display("Bundle contains '{}' more than once", path))]
    DuplicatePath { path: String },
    #[snafu(display("Bundle entry '{}' is out of order", path))]
    OutOfOrder { path: String },
    #[snafu(display("Invalid bundle entry '{}': {}", path, reason))]
    InvalidPath { path: String, reason: &'static str },
    #[snafu(display("Bundle entry '{}' lies below another file", path))]
    FileUsedAsDirectory { path: String },
    #[snafu(display("Bundle payload exceeds {} bytes", limit))]
    TooLarge { limit: u64 },
}
