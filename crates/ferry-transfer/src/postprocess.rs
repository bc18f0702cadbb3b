//! Post-processing of source files after a confirmed delivery.
//!
//! Every action is best effort: failures are logged and reported in the
//! outcome, and the source stays where it was so a later scan can pick it up.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::NaiveDateTime;
use ferry_config::PostProcessAction;
use serde::Serialize;
use tracing::{info, warn};

use crate::model::TransferUnit;
use crate::naming::timestamped_name;
use crate::relocate::move_file;
use crate::scanner::PROCESSED_SUFFIX;

/// How a post-processing action ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostProcessStatus {
    /// The action ran (including the deliberate no-op of `KeepAndReprocess`).
    Applied,
    /// Nothing to do: source already gone or archive directory unset.
    Skipped,
    /// The action failed; the source was left in place.
    Failed,
}

impl PostProcessStatus {
    /// Lowercase label used in events and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

/// Result of post-processing one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostProcessOutcome {
    /// Action that was attempted.
    pub action: PostProcessAction,
    /// Outcome of the action.
    pub status: PostProcessStatus,
    /// Where the source ended up, when it moved.
    pub final_path: Option<PathBuf>,
    /// Warning or error detail.
    pub detail: Option<String>,
}

impl PostProcessOutcome {
    const fn new(action: PostProcessAction, status: PostProcessStatus) -> Self {
        Self {
            action,
            status,
            final_path: None,
            detail: None,
        }
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Apply the unit's post-processing action to its source file.
#[must_use]
pub fn apply_post_process(
    unit: &TransferUnit,
    add_timestamp: bool,
    now: NaiveDateTime,
) -> PostProcessOutcome {
    let action = unit.post_process_action;
    let source = &unit.original_path;
    match action {
        PostProcessAction::Archive => {
            let Some(directory) = unit.archive_directory.as_ref() else {
                warn!(file = %unit.file_name, "archive directory not configured; leaving source in place");
                return PostProcessOutcome::new(action, PostProcessStatus::Skipped)
                    .with_detail("archive directory not configured");
            };
            if let Err(err) = fs::create_dir_all(directory) {
                warn!(error = %err, path = %directory.display(), "failed to create archive directory");
                return PostProcessOutcome::new(action, PostProcessStatus::Failed)
                    .with_detail(err.to_string());
            }
            let archived_name = if add_timestamp {
                timestamped_name(&unit.file_name, now)
            } else {
                unit.file_name.clone()
            };
            let destination = directory.join(archived_name);
            match move_file(source, &destination) {
                Ok(()) => {
                    info!(file = %unit.file_name, path = %destination.display(), "archived source file");
                    let mut outcome = PostProcessOutcome::new(action, PostProcessStatus::Applied);
                    outcome.final_path = Some(destination);
                    outcome
                }
                Err(err) => {
                    warn!(error = %err.detail(), file = %unit.file_name, "failed to archive source file");
                    PostProcessOutcome::new(action, PostProcessStatus::Failed)
                        .with_detail(err.detail())
                }
            }
        }
        PostProcessAction::Delete => match fs::remove_file(source) {
            Ok(()) => {
                info!(file = %unit.file_name, "deleted source file");
                PostProcessOutcome::new(action, PostProcessStatus::Applied)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(file = %unit.file_name, "source file already gone; nothing to delete");
                PostProcessOutcome::new(action, PostProcessStatus::Skipped)
                    .with_detail("source already removed")
            }
            Err(err) => {
                warn!(error = %err, file = %unit.file_name, "failed to delete source file");
                PostProcessOutcome::new(action, PostProcessStatus::Failed)
                    .with_detail(err.to_string())
            }
        },
        PostProcessAction::KeepAndMark => {
            if !source.exists() {
                return PostProcessOutcome::new(action, PostProcessStatus::Skipped)
                    .with_detail("source already removed");
            }
            let mut marked = source.clone().into_os_string();
            marked.push(PROCESSED_SUFFIX);
            let marked = PathBuf::from(marked);
            match fs::rename(source, &marked) {
                Ok(()) => {
                    let mut outcome = PostProcessOutcome::new(action, PostProcessStatus::Applied);
                    outcome.final_path = Some(marked);
                    outcome
                }
                Err(err) => {
                    warn!(error = %err, file = %unit.file_name, "failed to mark source file");
                    PostProcessOutcome::new(action, PostProcessStatus::Failed)
                        .with_detail(err.to_string())
                }
            }
        }
        PostProcessAction::KeepAndReprocess => {
            PostProcessOutcome::new(action, PostProcessStatus::Applied)
        }
    }
}
