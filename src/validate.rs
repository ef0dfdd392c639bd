//! Integrity checks for downloaded backups and generated exports
//!
//! Two independent checks guard the stage boundaries of the pipeline:
//! - [`validate_artifact`] is a liveness check on the downloaded backup
//!   (exists, non-empty). It does not look inside the dump.
//! - [`validate_export`] checks the structure of a price-list export before it
//!   is published: required columns present, at least one data row. Empty
//!   cells in required columns are reported but tolerated.

use crate::error::{Error, Result, ValidationError};
use crate::types::EXPORT_COLUMNS;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Check that a downloaded backup exists and is not empty
///
/// # Errors
///
/// Returns [`ValidationError::ArtifactMissing`] if `path` does not exist and
/// [`ValidationError::ArtifactEmpty`] if it has zero bytes.
pub async fn validate_artifact(path: &Path) -> Result<bool> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error!(?path, "backup file not found");
            return Err(ValidationError::ArtifactMissing(path.to_path_buf()).into());
        }
        Err(e) => return Err(Error::Io(e)),
    };

    if !metadata.is_file() {
        error!(?path, "backup path is not a regular file");
        return Err(ValidationError::ArtifactMissing(path.to_path_buf()).into());
    }

    if metadata.len() == 0 {
        error!(?path, "backup file is empty");
        return Err(ValidationError::ArtifactEmpty(path.to_path_buf()).into());
    }

    info!(?path, size = metadata.len(), "backup file validated");
    Ok(true)
}

/// Outcome of checking an export file
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportValidation {
    /// Whether the export may be published
    pub is_valid: bool,
    /// Why the export was rejected; `None` when valid
    pub reason: Option<String>,
    /// Number of data rows (excluding the header)
    pub rows: usize,
    /// Required columns containing empty cells, with the number of such cells
    pub null_counts: Vec<(String, usize)>,
}

impl ExportValidation {
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason.into()),
            rows: 0,
            null_counts: Vec::new(),
        }
    }

    /// The `(is_valid, reason)` pair
    pub fn verdict(&self) -> (bool, Option<&str>) {
        (self.is_valid, self.reason.as_deref())
    }
}

/// Check the structure of an export file
///
/// Never fails: unreadable or malformed files are reported as invalid with
/// the cause in `reason`.
pub async fn validate_export(path: &Path) -> ExportValidation {
    let owned: PathBuf = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || inspect_export(&owned))
        .await
        .unwrap_or_else(|e| ExportValidation::rejected(format!("export validation failed: {e}")));

    match (&result.reason, result.null_counts.is_empty()) {
        (Some(reason), _) => error!(?path, %reason, "export rejected"),
        (None, false) => {
            warn!(?path, null_counts = ?result.null_counts, "null values found in required columns");
            info!(?path, rows = result.rows, "export validated");
        }
        (None, true) => info!(?path, rows = result.rows, "export validated"),
    }

    result
}

fn inspect_export(path: &Path) -> ExportValidation {
    let mut reader = match csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
    {
        Ok(reader) => reader,
        Err(e) => return ExportValidation::rejected(format!("export validation failed: {e}")),
    };

    let headers = match reader.headers() {
        Ok(headers) => headers.clone(),
        Err(e) => return ExportValidation::rejected(format!("export validation failed: {e}")),
    };

    let mut indices = Vec::with_capacity(EXPORT_COLUMNS.len());
    let mut missing = Vec::new();
    for column in EXPORT_COLUMNS {
        match headers.iter().position(|h| h == column) {
            Some(index) => indices.push((column, index)),
            None => missing.push(column),
        }
    }
    if !missing.is_empty() {
        return ExportValidation::rejected(format!("missing columns: {}", missing.join(", ")));
    }

    let mut rows = 0usize;
    let mut nulls = vec![0usize; indices.len()];
    for record in reader.records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => return ExportValidation::rejected(format!("export validation failed: {e}")),
        };
        rows += 1;
        for (slot, (_, index)) in indices.iter().enumerate() {
            if record.get(*index).is_none_or(str::is_empty) {
                nulls[slot] += 1;
            }
        }
    }

    if rows == 0 {
        return ExportValidation::rejected("export file is empty");
    }

    let null_counts = indices
        .iter()
        .zip(nulls)
        .filter(|(_, count)| *count > 0)
        .map(|((column, _), count)| (column.to_string(), count))
        .collect();

    ExportValidation {
        is_valid: true,
        reason: None,
        rows,
        null_counts,
    }
}
