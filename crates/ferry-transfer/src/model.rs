//! Domain models shared by the collection and delivery stages.
//!
//! # Design
//! - Candidates and transfer units are produced fresh every run; nothing here is persisted.
//! - Transfer unit content is fixed at construction and only exposed read-only.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use ferry_config::PostProcessAction;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// A regular file found by the directory scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// File name inside the source directory.
    pub name: String,
    /// Size in bytes at scan time.
    pub size_bytes: u64,
    /// Modification time at scan time.
    pub last_modified_at: SystemTime,
    /// Whether the file lacks write permission.
    pub read_only: bool,
}

/// Result of running the validation chain on a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Hand the file to delivery.
    Accept,
    /// Skip the file and leave it in place.
    Reject,
    /// Skip the file and move it to the error directory when configured.
    RejectQuarantine,
}

/// Area of the check that rejected a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectCategory {
    /// Header or structure mismatch.
    Format,
    /// Size bounds or empty-file policy.
    Size,
    /// Exclusion mask or name pattern.
    Name,
    /// Content or line-count rules.
    Content,
    /// Existence, readability or read-only policy.
    Permission,
    /// Modification-age rules.
    Timestamp,
    /// File still being written.
    LockStatus,
    /// Anything else.
    Unknown,
}

impl RejectCategory {
    /// Lowercase label used in events and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Format => "format",
            Self::Size => "size",
            Self::Name => "name",
            Self::Content => "content",
            Self::Permission => "permission",
            Self::Timestamp => "timestamp",
            Self::LockStatus => "lock_status",
            Self::Unknown => "unknown",
        }
    }
}

/// Decision, reason and accumulated warnings for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    /// Final decision.
    pub decision: Decision,
    /// Rejection reason; `None` when accepted.
    pub reason: Option<String>,
    /// Rejection category; `None` when accepted.
    pub category: Option<RejectCategory>,
    /// Warning-level rule failures.
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    /// Accepted outcome carrying any warnings.
    #[must_use]
    pub const fn accept(warnings: Vec<String>) -> Self {
        Self {
            decision: Decision::Accept,
            reason: None,
            category: None,
            warnings,
        }
    }

    /// Rejection that leaves the file in place.
    #[must_use]
    pub fn reject(category: RejectCategory, reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::Reject,
            reason: Some(reason.into()),
            category: Some(category),
            warnings: Vec::new(),
        }
    }

    /// Rejection eligible for quarantine.
    #[must_use]
    pub fn reject_quarantine(category: RejectCategory, reason: impl Into<String>) -> Self {
        Self {
            decision: Decision::RejectQuarantine,
            reason: Some(reason.into()),
            category: Some(category),
            warnings: Vec::new(),
        }
    }

    /// Attach warnings gathered before the rejection.
    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Whether the file may proceed to delivery.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.decision == Decision::Accept
    }
}

/// Outcome of reading a candidate's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStatus {
    /// Content was read in full.
    ReadSuccess,
    /// Content could not be read.
    ReadFailed,
}

/// In-memory unit handed from collection to delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferUnit {
    /// Source file name.
    pub file_name: String,
    /// Source path.
    pub original_path: PathBuf,
    #[serde(skip)]
    content: Arc<[u8]>,
    /// Number of content bytes.
    pub size_bytes: u64,
    /// Post-processing to apply after delivery.
    pub post_process_action: PostProcessAction,
    /// Archive destination for [`PostProcessAction::Archive`].
    pub archive_directory: Option<PathBuf>,
    /// Read outcome.
    pub status: ReadStatus,
    /// Read error detail for [`ReadStatus::ReadFailed`].
    pub error_message: Option<String>,
    /// Hex SHA-256 of the content, when read.
    pub content_sha256: Option<String>,
    /// Source modification time at scan.
    pub last_modified_at: DateTime<Utc>,
}

impl TransferUnit {
    /// Build a unit from content read off disk.
    #[must_use]
    pub fn read(
        candidate: &FileCandidate,
        content: Vec<u8>,
        post_process_action: PostProcessAction,
        archive_directory: Option<PathBuf>,
    ) -> Self {
        let digest = format!("{:x}", Sha256::digest(&content));
        Self {
            file_name: candidate.name.clone(),
            original_path: candidate.path.clone(),
            size_bytes: u64::try_from(content.len()).unwrap_or(u64::MAX),
            content: Arc::from(content),
            post_process_action,
            archive_directory,
            status: ReadStatus::ReadSuccess,
            error_message: None,
            content_sha256: Some(digest),
            last_modified_at: candidate.last_modified_at.into(),
        }
    }

    /// Build a unit for a candidate whose content could not be read.
    #[must_use]
    pub fn read_failed(
        candidate: &FileCandidate,
        message: impl Into<String>,
        post_process_action: PostProcessAction,
        archive_directory: Option<PathBuf>,
    ) -> Self {
        Self {
            file_name: candidate.name.clone(),
            original_path: candidate.path.clone(),
            content: Arc::from(Vec::new()),
            size_bytes: 0,
            post_process_action,
            archive_directory,
            status: ReadStatus::ReadFailed,
            error_message: Some(message.into()),
            content_sha256: None,
            last_modified_at: candidate.last_modified_at.into(),
        }
    }

    /// Content bytes captured at read time.
    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Whether the unit is eligible for delivery.
    #[must_use]
    pub fn is_readable(&self) -> bool {
        self.status == ReadStatus::ReadSuccess
    }
}

/// Delivery status of one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    /// Content reached the destination (or the empty write was skipped by policy).
    Success,
    /// Writing failed.
    Failed,
}

impl DeliveryStatus {
    /// Lowercase label used in metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }
}

/// Result of delivering one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    /// Source file name.
    pub file_name: String,
    /// Destination file name.
    pub output_file_name: String,
    /// Destination path.
    pub output_path: PathBuf,
    /// Bytes written.
    pub size_bytes: u64,
    /// Delivery status.
    pub status: DeliveryStatus,
    /// Error detail when the write failed.
    pub error_message: Option<String>,
    /// The empty-message policy suppressed the write.
    pub skipped_empty: bool,
}

impl DeliveryResult {
    /// Whether post-processing may run for this result.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.status == DeliveryStatus::Success
    }
}

/// First error recorded for a file that failed to transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    /// Source file name.
    pub file_name: String,
    /// Error detail.
    pub message: String,
}

/// Counters and failures gathered by one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Run identifier shared by every event of the run.
    pub run_id: Uuid,
    /// Candidates produced by the scanner.
    pub discovered: u64,
    /// Candidates that passed validation.
    pub accepted: u64,
    /// Candidates rejected by validation.
    pub rejected: u64,
    /// Rejected candidates moved to the error directory.
    pub quarantined: u64,
    /// Units delivered successfully.
    pub transferred: u64,
    /// Units that failed to read or write.
    pub failed: u64,
    /// Post-processing actions that changed or intentionally kept the source.
    pub post_processed: u64,
    /// Warning-level rule failures across accepted files.
    pub warnings: u64,
    /// First error message per failed file.
    pub failures: Vec<FileFailure>,
    /// The run stopped early on a shutdown signal.
    pub cancelled: bool,
}

impl RunReport {
    /// Empty report for a new run.
    #[must_use]
    pub const fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            discovered: 0,
            accepted: 0,
            rejected: 0,
            quarantined: 0,
            transferred: 0,
            failed: 0,
            post_processed: 0,
            warnings: 0,
            failures: Vec::new(),
            cancelled: false,
        }
    }

    pub(crate) fn record_failure(&mut self, file_name: &str, message: impl Into<String>) {
        self.failed += 1;
        if !self.failures.iter().any(|f| f.file_name == file_name) {
            self.failures.push(FileFailure {
                file_name: file_name.to_string(),
                message: message.into(),
            });
        }
    }
}
