//! Event payload types emitted by the transfer pipeline.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identifier assigned to each event emitted by the pipeline.
pub type EventId = u64;

/// Default buffer size for the in-memory replay ring.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1_024;

/// Typed audit events surfaced by collection, delivery, and post-processing.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A pipeline run started scanning its source directory.
    RunStarted {
        /// Identifier of the run.
        run_id: Uuid,
        /// Directory being scanned.
        source_directory: String,
    },
    /// The scanner produced the candidate list for a run.
    FilesDiscovered {
        /// Identifier of the run.
        run_id: Uuid,
        /// Candidates in processing order.
        files: Vec<DiscoveredFile>,
    },
    /// A candidate passed every required validation check.
    FileValidated {
        /// Identifier of the run.
        run_id: Uuid,
        /// Source file name.
        file_name: String,
        /// Warning-level rule failures accumulated for the file.
        warnings: Vec<String>,
    },
    /// A candidate was rejected by the validation chain.
    FileRejected {
        /// Identifier of the run.
        run_id: Uuid,
        /// Source file name.
        file_name: String,
        /// Validation category that failed.
        category: String,
        /// Human-readable rejection reason.
        reason: String,
    },
    /// A rejected file was moved into the error directory.
    FileQuarantined {
        /// Identifier of the run.
        run_id: Uuid,
        /// Source file name.
        file_name: String,
        /// Final location inside the error directory.
        quarantine_path: String,
    },
    /// File content was written to the destination.
    FileTransferred {
        /// Identifier of the run.
        run_id: Uuid,
        /// Source file name.
        file_name: String,
        /// Destination path that received the content.
        output_path: String,
        /// Number of bytes delivered.
        size_bytes: u64,
    },
    /// Reading or writing a file failed.
    FileTransferFailed {
        /// Identifier of the run.
        run_id: Uuid,
        /// Source file name.
        file_name: String,
        /// Error detail.
        message: String,
    },
    /// The post-processing action for a delivered file finished.
    FilePostProcessed {
        /// Identifier of the run.
        run_id: Uuid,
        /// Source file name.
        file_name: String,
        /// Action that was applied (`archive`, `delete`, ...).
        action: String,
        /// Outcome label (`applied`, `skipped`, `failed`).
        outcome: String,
    },
    /// A run finished; per-file failures are reflected in the counters.
    RunCompleted {
        /// Identifier of the run.
        run_id: Uuid,
        /// Files written to the destination.
        transferred: u64,
        /// Files rejected by validation.
        rejected: u64,
        /// Files that failed to read or write.
        failed: u64,
        /// Whether the run stopped early on a shutdown signal.
        cancelled: bool,
    },
    /// A run aborted on a fatal, directory-level error.
    RunFailed {
        /// Identifier of the run.
        run_id: Uuid,
        /// Error detail.
        message: String,
    },
    /// Pipeline health changed (degraded or restored components).
    HealthChanged {
        /// Components currently considered degraded.
        degraded: Vec<String>,
    },
}

impl Event {
    /// Machine-friendly discriminator for audit consumers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run_started",
            Self::FilesDiscovered { .. } => "files_discovered",
            Self::FileValidated { .. } => "file_validated",
            Self::FileRejected { .. } => "file_rejected",
            Self::FileQuarantined { .. } => "file_quarantined",
            Self::FileTransferred { .. } => "file_transferred",
            Self::FileTransferFailed { .. } => "file_transfer_failed",
            Self::FilePostProcessed { .. } => "file_post_processed",
            Self::RunCompleted { .. } => "run_completed",
            Self::RunFailed { .. } => "run_failed",
            Self::HealthChanged { .. } => "health_changed",
        }
    }

    /// Run identifier carried by the event, if any.
    #[must_use]
    pub const fn run_id(&self) -> Option<Uuid> {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::FilesDiscovered { run_id, .. }
            | Self::FileValidated { run_id, .. }
            | Self::FileRejected { run_id, .. }
            | Self::FileQuarantined { run_id, .. }
            | Self::FileTransferred { run_id, .. }
            | Self::FileTransferFailed { run_id, .. }
            | Self::FilePostProcessed { run_id, .. }
            | Self::RunCompleted { run_id, .. }
            | Self::RunFailed { run_id, .. } => Some(*run_id),
            Self::HealthChanged { .. } => None,
        }
    }
}

/// Metadata wrapper around events. Each envelope tracks the event id and emission timestamp.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EventEnvelope {
    /// Monotonic identifier assigned to the wrapped event.
    pub id: EventId,
    /// Timestamp recording when the envelope was produced.
    pub timestamp: DateTime<Utc>,
    /// Wrapped event payload.
    pub event: Event,
}

/// Candidate file reported by the scanner.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// File name inside the source directory.
    pub name: String,
    /// Size of the file in bytes.
    pub size_bytes: u64,
}
