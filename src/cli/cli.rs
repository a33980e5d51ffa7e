use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::application::data::LogLevel;

/// Resolve embedding directives against a directory and inspect the result.
#[derive(Parser, Debug, Clone)]
#[command(name = "embedset", version, about)]
pub struct Cli {
    #[clap(long, short, default_value = "warn", value_enum, global = true)]
    pub log_level: LogLevel,

    /// The directory patterns are resolved against
    #[clap(long, short, default_value = ".", global = true)]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the paths selected by the patterns
    List {
        /// Patterns such as `static`, `static/*` or `all:static`.
        /// Defaults to the patterns in embed.yaml
        patterns: Vec<String>,
        /// Only show paths at or below this directory
        #[clap(long, short)]
        prefix: Option<String>,
        /// Also show size and digest
        #[clap(long)]
        long: bool,
    },
    /// Write the contents of one embedded file to stdout
    Cat {
        path: String,
        /// Patterns to resolve. Defaults to the patterns in embed.yaml
        #[clap(long = "pattern", short)]
        patterns: Vec<String>,
    },
    /// Resolve the patterns and write them as a bundle
    Pack {
        patterns: Vec<String>,
        /// Bundle file to write. Defaults to `bundle` in embed.yaml, then embed.bundle
        #[clap(long, short)]
        output: Option<PathBuf>,
    },
    /// List the contents of a bundle
    Inspect {
        bundle: PathBuf,
        #[clap(long, short)]
        prefix: Option<String>,
        #[clap(long)]
        long: bool,
    },
}
