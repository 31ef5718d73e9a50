//! Errors that abort a replay run.

use std::path::PathBuf;

use thiserror::Error;

/// Fatal replay error.
///
/// Schedule drift is not an error, it is reported in [`WorkloadReport`](crate::workload::WorkloadReport).
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Inconsistent configuration or platform description.
    #[error("configuration error: {0}")]
    Config(String),
    /// Missing or unreadable input, or unwritable output.
    #[error("cannot access {}: {}", .path.display(), .source)]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// Malformed line in a trace or service descriptor file.
    #[error("{}:{}: {}", .path.display(), .line, .message)]
    Parse {
        /// File path.
        path: PathBuf,
        /// Line number starting from 1.
        line: u64,
        /// What is wrong with the line.
        message: String,
    },
    /// Malformed YAML config.
    #[error("cannot parse YAML from {}: {}", .path.display(), .source)]
    Yaml {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_yaml::Error,
    },
    /// Failure to write energy records.
    #[error("cannot write records to {}: {}", .path.display(), .source)]
    Csv {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: csv::Error,
    },
}

impl ReplayError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, line: u64, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

/// Result type of replay operations.
pub type Result<T> = std::result::Result<T, ReplayError>;
