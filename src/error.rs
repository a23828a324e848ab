//! Error types for treewalk
//!
//! Every failure is fatal for a run, so the variants map onto the stages
//! where a run can stop: loading the configuration, validating the
//! command-line options, checking the destination tree, reading the source
//! tree and running actions.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for treewalk operations
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration file could not be read.
    #[error("Failed to read configuration {}: {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration document is not well-formed.
    #[error("Fatal error while parsing configuration at byte {position}: {message}")]
    ConfigParse { position: u64, message: String },

    /// An element lacks an attribute it cannot work without.
    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    /// An element appeared where it has no meaning, e.g. UPDATE outside SUBDIR.
    #[error("<{element}> must be nested inside <{parent}>")]
    Misplaced {
        element: &'static str,
        parent: &'static str,
    },

    /// A pattern is not a valid regular expression, or its target refers
    /// to a group the pattern does not define.
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// An option token on the command line is not declared by any OPTION.
    #[error("Invalid option: {option}")]
    UnknownOption { option: String },

    /// The destination tree failed a CHECKTARGET sanity check.
    #[error("Target-Directory check failed: {help}")]
    TargetCheck { file: PathBuf, help: String },

    /// A source directory could not be listed.
    #[error("Failed to read directory {}: {source}", path.display())]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The shell could not be started for an action.
    #[error("Failed to run action '{action}': {source}")]
    Spawn {
        action: String,
        source: std::io::Error,
    },

    /// An action command exited unsuccessfully.
    #[error("Error processing command ({status})\n{command}\n{output}")]
    CommandFailed {
        action: String,
        command: String,
        status: String,
        output: String,
    },
}

/// Result alias used across the library
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn parse(position: u64, message: impl Into<String>) -> Self {
        Error::ConfigParse {
            position,
            message: message.into(),
        }
    }
}
