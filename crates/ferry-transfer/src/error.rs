//! # Design
//!
//! - Provide structured, constant-message errors for the transfer pipeline.
//! - Capture operation context (paths, fields) so failures are reproducible in tests.
//! - Only directory-level problems surface as errors from a run; per-file
//!   failures are folded into the run report instead.

use std::io;
use std::path::PathBuf;

use ferry_config::ConfigError;
use thiserror::Error;

/// Result type for transfer operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors produced by the transfer pipeline.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The source directory is missing or not a directory.
    #[error("source not accessible")]
    SourceNotAccessible {
        /// Configured source directory.
        path: PathBuf,
    },
    /// IO failures while interacting with the filesystem.
    #[error("transfer io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Walkdir traversal failures.
    #[error("transfer walkdir failure")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// The configuration handed to the pipeline was rejected.
    #[error("invalid transfer configuration")]
    Config {
        /// Underlying configuration error.
        source: ConfigError,
    },
    /// A blocking worker task panicked or was cancelled.
    #[error("transfer worker failed")]
    Worker {
        /// Operation the worker was executing.
        operation: &'static str,
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

impl TransferError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) const fn worker(operation: &'static str, source: tokio::task::JoinError) -> Self {
        Self::Worker { operation, source }
    }

    /// Human-readable detail including the source chain, used in events and reports.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::SourceNotAccessible { path } => {
                format!("{self}: {}", path.display())
            }
            Self::Io {
                operation,
                path,
                source,
            } => format!("{self} ({operation}) at {}: {source}", path.display()),
            Self::Walkdir {
                operation,
                path,
                source,
            } => format!("{self} ({operation}) at {}: {source}", path.display()),
            Self::Config { source } => format!("{self}: {source}"),
            Self::Worker { operation, source } => format!("{self} ({operation}): {source}"),
        }
    }
}

impl From<ConfigError> for TransferError {
    fn from(source: ConfigError) -> Self {
        Self::Config { source }
    }
}
