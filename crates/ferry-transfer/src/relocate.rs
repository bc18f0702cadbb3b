//! File relocation shared by quarantine and archiving.

use std::fs;
use std::io;
use std::path::Path;

use tracing::warn;

use crate::error::{TransferError, TransferResult};

/// Move `source` to `destination`, falling back to copy + remove across devices.
///
/// When the copy succeeds but the source cannot be removed, the copy is
/// deleted again so the file never exists in both places.
pub(crate) fn move_file(source: &Path, destination: &Path) -> TransferResult<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(rename_err) if rename_err.kind() == io::ErrorKind::NotFound => Err(
            TransferError::io("relocate.rename", source, rename_err),
        ),
        Err(_rename_err) => {
            fs::copy(source, destination).map_err(|source_err| {
                TransferError::io("relocate.copy", destination, source_err)
            })?;
            if let Err(remove_err) = fs::remove_file(source) {
                if let Err(cleanup_err) = fs::remove_file(destination) {
                    warn!(
                        error = %cleanup_err,
                        path = %destination.display(),
                        "failed to remove copy after source removal failed"
                    );
                }
                return Err(TransferError::io("relocate.remove_source", source, remove_err));
            }
            Ok(())
        }
    }
}
