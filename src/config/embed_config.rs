use std::{
    borrow::Cow,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use compio::fs;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use tracing::debug;

use crate::{
    embed::{InclusionPattern, PatternError},
    ext::BestEffortPathExt,
};

pub const CONFIG_FILE_NAME: &str = "embed.yaml";

/// Project defaults read from `embed.yaml`.
///
/// ```yaml
/// patterns:
///   - templates
///   - static/*
///   - all:assets
/// bundle: target/site.bundle
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedConfig {
    pub patterns: Vec<InclusionPattern>,
    pub bundle: Option<PathBuf>,
}

impl EmbedConfig {
    /// Reads `embed.yaml` from `root`. A missing file yields the defaults.
    pub async fn read(root: &Path) -> Result<Self, ConfigError> {
        let path = root.join(CONFIG_FILE_NAME);
        debug!("Opening config file: {}", path.best_effort_path_display());

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).context(ReadSnafu {
                    file_path: path.best_effort_path_display(),
                });
            }
        };
        debug!("Successfully read config file: {} bytes", bytes.len());

        let contents = String::from_utf8(bytes).context(NotUtf8Snafu {
            file_path: path.best_effort_path_display(),
        })?;
        contents.as_str().try_into()
    }

    fn parse_patterns(value: &Yaml) -> Result<Vec<InclusionPattern>, ConfigError> {
        if let Yaml::Value(Scalar::Null) = value {
            return Ok(Vec::new());
        }
        value
            .as_sequence()
            .context(PatternsNotListSnafu)?
            .iter()
            .map(|item| {
                let raw = item.as_str().context(PatternNotStringSnafu)?;
                InclusionPattern::parse(raw).context(InvalidPatternSnafu)
            })
            .collect()
    }
}

fn key(name: &'static str) -> Yaml<'static> {
    Yaml::Value(Scalar::String(Cow::Borrowed(name)))
}

impl TryFrom<&str> for EmbedConfig {
    type Error = ConfigError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let document = documents.first().context(MalformedConfigSnafu)?;
        let top_level = document.as_mapping().context(TopLevelNotMapSnafu)?;

        let patterns = match top_level.get(&key("patterns")) {
            Some(value) => Self::parse_patterns(value)?,
            None => Vec::new(),
        };
        let bundle = match top_level.get(&key("bundle")) {
            None | Some(Yaml::Value(Scalar::Null)) => None,
            Some(value) => Some(PathBuf::from(value.as_str().context(BundleNotStringSnafu)?)),
        };

        Ok(EmbedConfig { patterns, bundle })
    }
}

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("Failed to read the config file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("The config file is not valid UTF-8: {}", file_path))]
    NotUtf8 {
        file_path: String,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("Failed to parse the config file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Improperly formatted config file"))]
    MalformedConfig,
    #[snafu(display("Top level of config should be a map"))]
    TopLevelNotMap,
    #[snafu(display("'patterns' should be a list"))]
    PatternsNotList,
    #[snafu(display("Every entry of 'patterns' should be a string"))]
    PatternNotString,
    #[snafu(display("Invalid entry in 'patterns'"))]
    InvalidPattern { source: PatternError },
    #[snafu(display("'bundle' should be a path string"))]
    BundleNotString,
}
