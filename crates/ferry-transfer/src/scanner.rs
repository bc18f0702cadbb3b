//! Directory scanning.
//!
//! Enumeration is non-recursive. Candidates are sorted by file name before
//! they are returned so every run processes files in the same order,
//! independent of what the filesystem yields.

use std::path::Path;

use globset::GlobSet;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{TransferError, TransferResult};
use crate::model::FileCandidate;

/// Suffix appended by `KeepAndMark`; such files are never rediscovered.
pub const PROCESSED_SUFFIX: &str = ".processed";

/// List regular files in `source` whose names match `include`.
///
/// # Errors
///
/// Returns [`TransferError::SourceNotAccessible`] if `source` is missing or
/// not a directory. Unreadable entries are skipped with a warning.
pub fn scan(source: &Path, include: &GlobSet) -> TransferResult<Vec<FileCandidate>> {
    if !source.is_dir() {
        return Err(TransferError::SourceNotAccessible {
            path: source.to_path_buf(),
        });
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(source).min_depth(1).max_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(TransferError::walkdir("scan.walk", source, err));
            }
            Err(err) => {
                warn!(error = %err, path = %source.display(), "failed to read directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            warn!(path = %entry.path().display(), "skipping file with non UTF-8 name");
            continue;
        };
        if name.ends_with(PROCESSED_SUFFIX) || !include.is_match(&name) {
            continue;
        }
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(error = %err, file = %name, "failed to read file metadata");
                continue;
            }
        };
        let last_modified_at = match metadata.modified() {
            Ok(modified) => modified,
            Err(err) => {
                warn!(error = %err, file = %name, "modification time unavailable");
                continue;
            }
        };
        candidates.push(FileCandidate {
            path: entry.path().to_path_buf(),
            name,
            size_bytes: metadata.len(),
            last_modified_at,
            read_only: metadata.permissions().readonly(),
        });
    }

    candidates.sort_by(|left, right| left.name.cmp(&right.name));
    debug!(count = candidates.len(), path = %source.display(), "scan complete");
    Ok(candidates)
}
