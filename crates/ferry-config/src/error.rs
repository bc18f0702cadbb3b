//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required option was absent or blank.
    #[error("missing configuration field")]
    MissingField {
        /// Option key that was expected.
        field: &'static str,
    },
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: String,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// A glob option could not be compiled.
    #[error("invalid glob pattern")]
    InvalidGlob {
        /// Option key holding the pattern.
        field: &'static str,
        /// Pattern supplied by the caller.
        value: String,
        /// Underlying globset error.
        source: globset::Error,
    },
    /// A validation rule regular expression could not be compiled.
    #[error("invalid regular expression")]
    InvalidRegex {
        /// Rule identifier holding the expression.
        field: String,
        /// Expression supplied by the caller.
        value: String,
        /// Underlying regex error.
        source: regex::Error,
    },
    /// A JSON document or option map could not be decoded.
    #[error("failed to decode JSON configuration")]
    Json {
        /// File that was being decoded, if any.
        path: Option<PathBuf>,
        /// Underlying serde error.
        source: serde_json::Error,
    },
    /// A YAML definition file could not be decoded.
    #[error("failed to decode YAML configuration")]
    Yaml {
        /// File that was being decoded.
        path: PathBuf,
        /// Underlying serde error.
        source: serde_yaml::Error,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        field: impl Into<String>,
        value: Option<String>,
        reason: &'static str,
    ) -> Self {
        Self::InvalidField {
            field: field.into(),
            value,
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn invalid_helper_populates_context() {
        let err = ConfigError::invalid("maximumConcurrency", Some("0".into()), "must be positive");
        match &err {
            ConfigError::InvalidField {
                field,
                value,
                reason,
            } => {
                assert_eq!(field, "maximumConcurrency");
                assert_eq!(value.as_deref(), Some("0"));
                assert_eq!(*reason, "must be positive");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "invalid configuration field");
        assert!(err.source().is_none());
    }

    #[test]
    fn io_error_exposes_source() {
        let err = ConfigError::Io {
            operation: "definition.read",
            path: PathBuf::from("/missing.json"),
            source: io::Error::new(io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.to_string(), "filesystem operation failed");
        assert!(err.source().is_some());
    }
}
