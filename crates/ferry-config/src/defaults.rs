//! Default values and environment keys for transfer configuration.
//!
//! # Design
//! - Centralize defaults so the loader, model constructors and docs agree.

/// Include glob used when `filePattern` is absent.
pub(crate) const DEFAULT_FILE_PATTERN: &str = "*";
/// Worker pool size used when `maximumConcurrency` is absent.
pub(crate) const DEFAULT_MAXIMUM_CONCURRENCY: usize = 1;
/// Environment variable overriding `sourceDirectory`.
pub const ENV_SOURCE_DIRECTORY: &str = "FERRY_SOURCE_DIRECTORY";
/// Environment variable overriding `targetDirectory`.
pub const ENV_TARGET_DIRECTORY: &str = "FERRY_TARGET_DIRECTORY";
