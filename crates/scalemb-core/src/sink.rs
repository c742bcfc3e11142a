//! Sink Writer: persists an embedded table as CSV without ever leaving a
//! partial file behind.
//!
//! Rows are written to a temporary file next to the destination and renamed
//! into place. Under [`OverwritePolicy::FailIfExists`] the rename is
//! no-clobber, so an artifact that appears after the pre-flight check is
//! still never replaced.

use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::types::{ItemTable, OverwritePolicy, EMBEDDING_COLUMN};

/// Fails with `DestinationExists` when `dest` exists and the policy forbids replacing it.
pub fn check_destination(dest: &Path, policy: OverwritePolicy) -> Result<()> {
    if policy == OverwritePolicy::FailIfExists && dest.exists() {
        return Err(Error::DestinationExists(dest.to_path_buf()));
    }
    Ok(())
}

pub fn write(table: &ItemTable, dest: &Path, policy: OverwritePolicy) -> Result<()> {
    if !table.has_column(EMBEDDING_COLUMN) {
        return Err(Error::Schema(format!("table has no '{EMBEDDING_COLUMN}' column")));
    }
    check_destination(dest, policy)?;

    let io_err = |source: std::io::Error| Error::Io { path: dest.to_path_buf(), source };
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    {
        let mut writer = csv::Writer::from_writer(tmp.as_file_mut());
        writer.write_record(table.columns()).map_err(|e| io_err(e.into()))?;
        for row in table.rows() {
            writer.write_record(row).map_err(|e| io_err(e.into()))?;
        }
        writer.flush().map_err(io_err)?;
    }
    tmp.as_file_mut().sync_all().map_err(io_err)?;

    match policy {
        OverwritePolicy::FailIfExists => {
            tmp.persist_noclobber(dest).map_err(|e| {
                if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                    Error::DestinationExists(dest.to_path_buf())
                } else {
                    io_err(e.error)
                }
            })?;
        }
        OverwritePolicy::Overwrite => {
            if dest.exists() {
                warn!(path = %dest.display(), "overwriting existing artifact");
            }
            tmp.persist(dest).map_err(|e| io_err(e.error))?;
        }
    }
    info!(path = %dest.display(), rows = table.len(), "wrote embeddings");
    Ok(())
}
