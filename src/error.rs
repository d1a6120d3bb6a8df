//! Error types and result aliases for tidyfmt.
//!
//! This module defines the error handling infrastructure:
//! - [`Result<T>`]: Type alias for `anyhow::Result<T>` used at the binary edge
//! - Domain error enums whose `Display` output is the diagnostic the user sees

use std::path::PathBuf;

use anyhow::Result as AnyhowResult;
use thiserror::Error;

pub type Result<T> = AnyhowResult<T>;

/// Malformed switch usage. Always reported together with the usage text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    #[error("Unrecognized switch: '{0}'")]
    UnrecognizedSwitch(String),

    #[error("Switch '{switch}' takes {expected}, found {found}")]
    SwitchArity {
        switch: String,
        expected: String,
        found: String,
    },

    #[error("Switch '{0}' cannot follow an options map, only -w or --write can")]
    SwitchAfterMap(String),

    #[error("An options map takes no additional arguments unless followed by -w or --write, found {0}")]
    ExtraAfterConfig(String),
}

/// The inline options map could not be read.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to read configuration from command line: {detail} in '{text}'")]
pub struct OptionParseError {
    pub detail: String,
    pub text: String,
}

/// Errors from reading the map syntax.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message} at offset {offset}")]
pub struct ReadError {
    pub message: String,
    pub offset: usize,
}

/// Configuration errors raised by the merge interface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more sources produced invalid values
    #[error("{}", .0.join("\n"))]
    Validation(Vec<String>),

    /// A single configuration map could not be applied
    #[error("Unable to apply configuration from {source_label}: {detail}")]
    Apply { source_label: String, detail: String },

    /// A configuration file existed but could not be read or parsed
    #[error("Unable to read configuration file {}: {detail}", .path.display())]
    Read { path: PathBuf, detail: String },
}

/// Remote configuration could not be loaded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unable to load configuration from URL {url}: {detail}")]
pub struct LoadError {
    pub url: String,
    pub detail: String,
}

/// The formatting engine rejected its input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{detail} in {source_name}")]
pub struct FormatError {
    pub source_name: String,
    pub detail: String,
}

/// Per-file failures in the batch orchestrator
#[derive(Error, Debug)]
pub enum FileError {
    #[error("Failed to format file: {}: unable to read: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine detail already names the source, so only the detail is shown
    #[error("Failed to format file: {}: {}", .path.display(), .source.detail)]
    Format {
        path: PathBuf,
        #[source]
        source: FormatError,
    },

    #[error("Failed to format file: {}: unable to write: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
