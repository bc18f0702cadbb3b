//! Error-directory quarantine for rejected files.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{TransferError, TransferResult};
use crate::relocate::move_file;

const PREFIX_FORMAT: &str = "%Y%m%d_%H%M%S";

/// `<yyyyMMdd_HHmmss>_<name>`.
#[must_use]
pub fn quarantine_name(file_name: &str, now: NaiveDateTime) -> String {
    format!("{}_{file_name}", now.format(PREFIX_FORMAT))
}

/// Move `source` into `error_directory`, creating the directory if needed.
///
/// # Errors
///
/// Returns an IO error if the directory cannot be created or the move fails.
/// On failure the source is left where it was.
pub fn quarantine_file(
    source: &Path,
    error_directory: &Path,
    now: NaiveDateTime,
) -> TransferResult<PathBuf> {
    let file_name = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            TransferError::io(
                "quarantine.file_name",
                source,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })?;
    fs::create_dir_all(error_directory)
        .map_err(|err| TransferError::io("quarantine.create_dir", error_directory, err))?;
    let destination = error_directory.join(quarantine_name(&file_name, now));
    move_file(source, &destination)?;
    Ok(destination)
}
