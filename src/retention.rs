//! Bounded retention of published exports

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, warn};

/// Outcome of a retention pass
#[must_use]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Exports kept, newest first
    pub kept: Vec<PathBuf>,
    /// Exports deleted
    pub removed: Vec<PathBuf>,
}

/// Keeps only the newest exports in the export directory
///
/// Only `*.csv` regular files directly inside the directory are considered.
/// Subdirectories (including the staging directory) and downloaded backups
/// are never touched.
#[derive(Debug, Clone)]
pub struct RetentionManager {
    exports_dir: PathBuf,
    default_keep: usize,
}

impl RetentionManager {
    /// Create a manager for `exports_dir` keeping `default_keep` files by default
    pub fn new(exports_dir: impl Into<PathBuf>, default_keep: usize) -> Self {
        Self {
            exports_dir: exports_dir.into(),
            default_keep,
        }
    }

    /// The managed directory
    pub fn exports_dir(&self) -> &Path {
        &self.exports_dir
    }

    /// Published exports, newest first
    ///
    /// Ordered by modification time; ties go to the name sorting last, which
    /// for `ddMMyyyy-HHmm` stamps within a day is the later one. A missing
    /// directory has no exports.
    pub async fn list_exports(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match tokio::fs::read_dir(&self.exports_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Io(e)),
        };

        let mut exports: Vec<(SystemTime, PathBuf)> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
            {
                continue;
            }
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            exports.push((metadata.modified()?, path));
        }

        exports.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        Ok(exports.into_iter().map(|(_, path)| path).collect())
    }

    /// Delete every export beyond the newest `keep` (default: configured count)
    ///
    /// Idempotent: a second pass with the same `keep` removes nothing. A
    /// `keep` of zero is rejected so the newest export always survives.
    pub async fn cleanup(&self, keep: Option<usize>) -> Result<CleanupReport> {
        let keep = keep.unwrap_or(self.default_keep);
        if keep == 0 {
            return Err(Error::config(
                "retention must keep at least one export",
                "MAX_CSV_FILES",
            ));
        }
        let mut kept = self.list_exports().await?;
        let excess = kept.split_off(keep.min(kept.len()));

        let mut removed = Vec::with_capacity(excess.len());
        for path in excess {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    debug!(?path, "removed old export");
                    removed.push(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(?path, "export disappeared before removal");
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }

        info!(
            dir = ?self.exports_dir,
            kept = kept.len(),
            removed = removed.len(),
            "export retention applied"
        );
        Ok(CleanupReport { kept, removed })
    }
}

/// Most recently modified export in `dir`, if any
pub(crate) async fn latest_export(dir: &Path) -> Result<Option<PathBuf>> {
    let manager = RetentionManager::new(dir, usize::MAX);
    Ok(manager.list_exports().await?.into_iter().next())
}
