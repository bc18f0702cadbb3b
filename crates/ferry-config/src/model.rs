//! Typed configuration models for the transfer pipeline.
//!
//! # Design
//! - Every string-typed option is a closed enum with a single `parse_or_default`
//!   boundary; unknown labels are logged there and nowhere else.
//! - Pure data carriers; loading and validation live in `loader.rs`/`validate.rs`.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::defaults::{DEFAULT_FILE_PATTERN, DEFAULT_MAXIMUM_CONCURRENCY};
use crate::error::ConfigError;

/// Lowercase a label and strip separators so `KEEP_AND_MARK`, `KeepAndMark`
/// and `keep-and-mark` compare equal.
fn normalise_label(value: &str) -> String {
    value
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

/// Behaviour when a candidate file has zero bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmptyFileHandling {
    /// Reject the file without creating a transfer unit.
    #[default]
    DoNotCreateMessage,
    /// Reject the file and leave it for a later cycle.
    SkipEmptyFiles,
    /// Accept the file like any other.
    ProcessEmptyFiles,
}

impl FromStr for EmptyFileHandling {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalise_label(s).as_str() {
            "donotcreatemessage" => Ok(Self::DoNotCreateMessage),
            "skipemptyfiles" | "skip" => Ok(Self::SkipEmptyFiles),
            "processemptyfiles" | "process" => Ok(Self::ProcessEmptyFiles),
            _ => Err(ConfigError::invalid(
                "emptyFileHandling",
                Some(s.to_string()),
                "unknown empty file handling",
            )),
        }
    }
}

impl EmptyFileHandling {
    /// Parse a label, falling back to the default with a warning.
    #[must_use]
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(value, "unknown emptyFileHandling; using default");
            Self::default()
        })
    }

    /// Render the policy as its canonical label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DoNotCreateMessage => "DoNotCreateMessage",
            Self::SkipEmptyFiles => "SkipEmptyFiles",
            Self::ProcessEmptyFiles => "ProcessEmptyFiles",
        }
    }
}

/// Behaviour when delivering a transfer unit without content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EmptyMessageHandling {
    /// Create an empty destination file.
    #[default]
    WriteEmptyFile,
    /// Skip the write and report success.
    SkipEmptyMessages,
}

impl FromStr for EmptyMessageHandling {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalise_label(s).as_str() {
            "writeemptyfile" => Ok(Self::WriteEmptyFile),
            "skipemptymessages" | "skipempty" | "skip" => Ok(Self::SkipEmptyMessages),
            _ => Err(ConfigError::invalid(
                "emptyMessageHandling",
                Some(s.to_string()),
                "unknown empty message handling",
            )),
        }
    }
}

impl EmptyMessageHandling {
    /// Parse a label, falling back to the default with a warning.
    #[must_use]
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(value, "unknown emptyMessageHandling; using default");
            Self::default()
        })
    }

    /// Render the policy as its canonical label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WriteEmptyFile => "WriteEmptyFile",
            Self::SkipEmptyMessages => "SkipEmptyMessages",
        }
    }
}

/// Terminal action applied to a source file after a confirmed delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PostProcessAction {
    /// Move the source into the archive directory.
    #[default]
    Archive,
    /// Remove the source file.
    Delete,
    /// Rename the source to `<name>.processed`.
    KeepAndMark,
    /// Leave the source untouched so the next scan picks it up again.
    KeepAndReprocess,
}

impl FromStr for PostProcessAction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalise_label(s).as_str() {
            "archive" => Ok(Self::Archive),
            "delete" => Ok(Self::Delete),
            "keepandmark" => Ok(Self::KeepAndMark),
            "keepandreprocess" => Ok(Self::KeepAndReprocess),
            "test" => {
                info!("processing mode TEST leaves source files in place");
                Ok(Self::KeepAndReprocess)
            }
            _ => Err(ConfigError::invalid(
                "postProcessAction",
                Some(s.to_string()),
                "unknown post-process action",
            )),
        }
    }
}

impl PostProcessAction {
    /// Parse a label; unknown values become [`PostProcessAction::Archive`] with a warning.
    #[must_use]
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(value, "unknown post-process action; treating as ARCHIVE");
            Self::Archive
        })
    }

    /// Lowercase label used in events and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Archive => "archive",
            Self::Delete => "delete",
            Self::KeepAndMark => "keep_and_mark",
            Self::KeepAndReprocess => "keep_and_reprocess",
        }
    }
}

/// How destination file names are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutputNamingMode {
    /// Keep the source name.
    #[default]
    Original,
    /// Append `_<YYYYMMDDHHMMSS>` before the extension.
    Timestamped,
    /// Substitute tokens in `customFilenamePattern`.
    CustomPattern,
}

impl FromStr for OutputNamingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalise_label(s).as_str() {
            "useoriginal" | "original" => Ok(Self::Original),
            "addtimestamp" | "timestamped" => Ok(Self::Timestamped),
            "custom" | "custompattern" => Ok(Self::CustomPattern),
            _ => Err(ConfigError::invalid(
                "outputFilenameMode",
                Some(s.to_string()),
                "unknown output filename mode",
            )),
        }
    }
}

impl OutputNamingMode {
    /// Parse a label, falling back to [`OutputNamingMode::Original`] with a warning.
    #[must_use]
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(value, "unknown outputFilenameMode; using original names");
            Self::default()
        })
    }

    /// Render the mode as its canonical label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Original => "UseOriginal",
            Self::Timestamped => "AddTimestamp",
            Self::CustomPattern => "Custom",
        }
    }
}

/// How content reaches the destination path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WriteMode {
    /// Write the destination in place, overwriting.
    #[default]
    Direct,
    /// Write `<dest>.tmp`, fsync, then rename over `<dest>`.
    TempThenRename,
}

impl FromStr for WriteMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalise_label(s).as_str() {
            "directly" | "direct" => Ok(Self::Direct),
            "createtempfile" | "tempthenrename" => Ok(Self::TempThenRename),
            _ => Err(ConfigError::invalid(
                "writeMode",
                Some(s.to_string()),
                "unknown write mode",
            )),
        }
    }
}

impl WriteMode {
    /// Parse a label, falling back to [`WriteMode::Direct`] with a warning.
    #[must_use]
    pub fn parse_or_default(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            warn!(value, "unknown writeMode; writing directly");
            Self::default()
        })
    }

    /// Render the mode as its canonical label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "Directly",
            Self::TempThenRename => "Create Temp File",
        }
    }
}

/// Whether a failed optional rule blocks the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Reject (and quarantine) the file.
    #[default]
    #[serde(alias = "ERROR", alias = "Error")]
    Error,
    /// Record a warning and keep going.
    #[serde(alias = "WARNING", alias = "Warning", alias = "warn")]
    Warning,
}

/// Optional validation rule evaluated after the required checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleSpec {
    /// File name must match a regular expression.
    NamePattern {
        /// Regular expression applied to the file name.
        pattern: String,
    },
    /// Content must contain the given text.
    ContentContains {
        /// Required substring.
        value: String,
    },
    /// Content must not contain the given text.
    ContentExcludes {
        /// Forbidden substring.
        value: String,
    },
    /// First line of content must match a regular expression.
    HeaderMatch {
        /// Regular expression applied to the first line.
        pattern: String,
    },
    /// Number of lines must fall inside the range.
    LineCount {
        /// Inclusive lower bound.
        #[serde(default)]
        min: Option<u64>,
        /// Inclusive upper bound.
        #[serde(default)]
        max: Option<u64>,
    },
    /// File size in bytes must fall inside the range.
    SizeRange {
        /// Inclusive lower bound.
        #[serde(default)]
        min: Option<u64>,
        /// Inclusive upper bound.
        #[serde(default)]
        max: Option<u64>,
    },
    /// File must not have been modified within the last `seconds`.
    MinimumAge {
        /// Minimum age in seconds.
        seconds: u64,
    },
}

impl RuleSpec {
    /// Short identifier used in logs and rejection reasons.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NamePattern { .. } => "namePattern",
            Self::ContentContains { .. } => "contentContains",
            Self::ContentExcludes { .. } => "contentExcludes",
            Self::HeaderMatch { .. } => "headerMatch",
            Self::LineCount { .. } => "lineCount",
            Self::SizeRange { .. } => "sizeRange",
            Self::MinimumAge { .. } => "minimumAge",
        }
    }
}

/// A rule together with its severity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRuleConfig {
    /// Rule definition.
    #[serde(flatten)]
    pub rule: RuleSpec,
    /// Failure severity; defaults to `error`.
    #[serde(default)]
    pub severity: Severity,
}

/// Fully resolved configuration for one collector/delivery adapter pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Directory scanned for candidates.
    pub source_directory: PathBuf,
    /// Directory receiving delivered files.
    pub target_directory: PathBuf,
    /// Include glob applied to file names.
    pub file_pattern: String,
    /// Exclusion glob; matches are rejected without quarantine.
    pub exclusion_mask: Option<String>,
    /// Accept files without write permission.
    pub process_read_only_files: bool,
    /// Upper size bound in bytes; `0` means unlimited.
    pub maximum_file_size: u64,
    /// Stability window; zero disables the check.
    pub stability_wait: Duration,
    /// Policy for zero-byte candidates.
    pub empty_file_handling: EmptyFileHandling,
    /// Policy for delivering empty content.
    pub empty_message_handling: EmptyMessageHandling,
    /// Action applied to the source after delivery.
    pub post_process_action: PostProcessAction,
    /// Destination for archived sources.
    pub archive_directory: Option<PathBuf>,
    /// Append a timestamp suffix to archived names.
    pub add_timestamp: bool,
    /// Quarantine rejected files.
    pub archive_faulty_source_files: bool,
    /// Quarantine directory.
    pub archive_error_directory: Option<PathBuf>,
    /// Destination naming mode.
    pub output_naming_mode: OutputNamingMode,
    /// Template used by [`OutputNamingMode::CustomPattern`].
    pub custom_filename_pattern: Option<String>,
    /// Write strategy.
    pub write_mode: WriteMode,
    /// Number of deliveries allowed to run at once.
    pub maximum_concurrency: usize,
    /// Optional rules evaluated after the required checks.
    pub validation_rules: Vec<ValidationRuleConfig>,
    /// Interval between runs when the application polls; `None` runs once.
    pub poll_interval: Option<Duration>,
}

impl TransferConfig {
    /// Build a configuration with defaults for every optional setting.
    #[must_use]
    pub fn new(source_directory: impl Into<PathBuf>, target_directory: impl Into<PathBuf>) -> Self {
        Self {
            source_directory: source_directory.into(),
            target_directory: target_directory.into(),
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            exclusion_mask: None,
            process_read_only_files: false,
            maximum_file_size: 0,
            stability_wait: Duration::ZERO,
            empty_file_handling: EmptyFileHandling::default(),
            empty_message_handling: EmptyMessageHandling::default(),
            post_process_action: PostProcessAction::default(),
            archive_directory: None,
            add_timestamp: false,
            archive_faulty_source_files: false,
            archive_error_directory: None,
            output_naming_mode: OutputNamingMode::default(),
            custom_filename_pattern: None,
            write_mode: WriteMode::default(),
            maximum_concurrency: DEFAULT_MAXIMUM_CONCURRENCY,
            validation_rules: Vec::new(),
            poll_interval: None,
        }
    }

    /// Error directory when quarantine is enabled and configured.
    #[must_use]
    pub fn quarantine_directory(&self) -> Option<&PathBuf> {
        if self.archive_faulty_source_files {
            self.archive_error_directory.as_ref()
        } else {
            None
        }
    }
}

/// Creation and modification stamp carried by persisted entities.
///
/// Callers set the stamp explicitly; nothing fills it in behind their back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditStamp {
    /// When the entity was created.
    pub created_at: DateTime<Utc>,
    /// Who created the entity.
    pub created_by: String,
    /// When the entity was last modified.
    pub updated_at: DateTime<Utc>,
    /// Who last modified the entity.
    pub updated_by: String,
}

impl AuditStamp {
    /// Stamp for a newly created entity.
    #[must_use]
    pub fn created(by: impl Into<String>, at: DateTime<Utc>) -> Self {
        let by = by.into();
        Self {
            created_at: at,
            created_by: by.clone(),
            updated_at: at,
            updated_by: by,
        }
    }

    /// Record a modification, keeping the creation fields intact.
    pub fn touch(&mut self, by: impl Into<String>, at: DateTime<Utc>) {
        self.updated_at = at;
        self.updated_by = by.into();
    }
}

/// Stored adapter definition: identity, audit stamp, and the raw option map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdapterDefinition {
    /// Adapter identifier.
    pub id: Uuid,
    /// Human-readable adapter name.
    pub name: String,
    /// Audit stamp maintained by the caller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit: Option<AuditStamp>,
    /// camelCase option map consumed by [`crate::from_options`].
    #[serde(default)]
    pub settings: Map<String, Value>,
}
