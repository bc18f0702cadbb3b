//! Destination write strategies.

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use ferry_config::WriteMode;
use tracing::{debug, warn};

use crate::error::{TransferError, TransferResult};

const TEMP_SUFFIX: &str = ".tmp";

/// `<dest>.tmp` sibling used by [`WriteMode::TempThenRename`].
#[must_use]
pub fn temp_path_for(destination: &Path) -> PathBuf {
    let mut raw = OsString::from(destination.as_os_str());
    raw.push(TEMP_SUFFIX);
    PathBuf::from(raw)
}

/// Write `content` to `destination` using `mode`.
///
/// # Errors
///
/// Returns an IO error if the file cannot be created, written, synced or
/// renamed. Under [`WriteMode::TempThenRename`] a temp file created by this
/// call is removed before the error is returned.
///
/// The temp file is opened with `create_new`. A leftover temp file from an
/// interrupted run is removed and creation retried once; callers must not
/// write the same destination concurrently.
pub fn write_content(destination: &Path, content: &[u8], mode: WriteMode) -> TransferResult<()> {
    match mode {
        WriteMode::Direct => fs::write(destination, content)
            .map_err(|source| TransferError::io("write.direct", destination, source)),
        WriteMode::TempThenRename => {
            let temp = temp_path_for(destination);
            let file = create_temp(&temp)?;
            let result = write_synced(file, &temp, content).and_then(|()| {
                fs::rename(&temp, destination)
                    .map_err(|source| TransferError::io("write.rename", destination, source))
            });
            if result.is_err() {
                discard_temp(&temp);
            }
            result
        }
    }
}

fn create_temp(temp: &Path) -> TransferResult<File> {
    let open = || OpenOptions::new().write(true).create_new(true).open(temp);
    match open() {
        Ok(file) => Ok(file),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            warn!(path = %temp.display(), "removing stale temp file");
            fs::remove_file(temp)
                .map_err(|source| TransferError::io("write.remove_stale_temp", temp, source))?;
            open().map_err(|source| TransferError::io("write.create_temp", temp, source))
        }
        Err(source) => Err(TransferError::io("write.create_temp", temp, source)),
    }
}

fn write_synced(mut file: File, path: &Path, content: &[u8]) -> TransferResult<()> {
    file.write_all(content)
        .map_err(|source| TransferError::io("write.temp_content", path, source))?;
    file.sync_all()
        .map_err(|source| TransferError::io("write.sync_temp", path, source))
}

fn discard_temp(temp: &Path) {
    match fs::remove_file(temp) {
        Ok(()) => debug!(path = %temp.display(), "removed temp file after failed write"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(
            error = %err,
            path = %temp.display(),
            "failed to remove temp file after failed write"
        ),
    }
}
