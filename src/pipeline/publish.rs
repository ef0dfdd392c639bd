//! Publish stage: move a validated export out of staging

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Remove exports left in staging by earlier rejected runs
///
/// A rejected export is kept for inspection until the next run starts its
/// export stage. Returns the number of files removed; a missing staging
/// directory counts as empty.
pub(crate) async fn clear_staging(staging_dir: &Path) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(staging_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(Error::Io(e)),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        tokio::fs::remove_file(&path).await?;
        debug!(?path, "removed stale staged export");
        removed += 1;
    }

    if removed > 0 {
        info!(dir = ?staging_dir, removed, "cleared staging directory");
    }
    Ok(removed)
}

/// Rename a staged export into the export directory
///
/// Staging is a subdirectory of the export directory, so the rename stays on
/// one filesystem and the export appears under its final name in one step.
pub(crate) async fn publish_export(staged: &Path, exports_dir: &Path) -> Result<PathBuf> {
    let file_name = staged.file_name().ok_or_else(|| {
        Error::NotFound(format!("staged export has no file name: {}", staged.display()))
    })?;
    let published = exports_dir.join(file_name);

    tokio::fs::create_dir_all(exports_dir).await?;
    tokio::fs::rename(staged, &published).await?;

    info!(from = ?staged, to = ?published, "export published");
    Ok(published)
}
