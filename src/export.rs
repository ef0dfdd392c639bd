//! Price-list export from the restored database

use crate::config::DatabaseConfig;
use crate::error::{DatabaseError, Result};
use crate::types::EXPORT_COLUMNS;
use async_trait::async_trait;
use sqlx::{Connection, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Item names joined with every unit conversion and the matching sale price
///
/// Columns are cast to text so numeric precision is written exactly as stored.
pub const PRICE_LIST_QUERY: &str = "\
SELECT i.namaitem::text AS namaitem,
       s.jumlahkonv::text AS konversi,
       s.satuan::text AS satuan,
       s.hargapokok::text AS hargapokok,
       h.hargajual::text AS hargajual
FROM tbl_item i
JOIN tbl_itemsatuanjml s ON i.kodeitem = s.kodeitem
JOIN tbl_itemhj h ON i.kodeitem = h.kodeitem AND s.satuan = h.satuan";

/// One exported row; `None` is SQL NULL
pub type ExportRow = [Option<String>; 5];

/// Result of a completed export
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    /// Written export file
    pub path: PathBuf,
    /// Number of data rows
    pub rows: usize,
}

/// Trait for producing the price-list export
#[async_trait]
pub trait ExportGenerator: Send + Sync {
    /// Query the price list and write it to `output` as CSV
    ///
    /// Parent directories are created. The header row is always written.
    ///
    /// # Errors
    ///
    /// Returns a [`DatabaseError`] carrying the driver or I/O message.
    async fn export_to_csv(&self, output: &Path) -> Result<ExportReport>;

    /// Name of this implementation (for logging)
    fn name(&self) -> &'static str;
}

/// Export generator querying PostgreSQL through sqlx
pub struct PgExporter {
    config: DatabaseConfig,
}

impl PgExporter {
    /// Create an exporter for the configured target database
    pub fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }

    async fn fetch_rows(&self) -> Result<Vec<ExportRow>> {
        let mut conn = crate::db::connect(&self.config).await?;

        let fetched = sqlx::query(PRICE_LIST_QUERY).fetch_all(&mut conn).await;
        if let Err(e) = conn.close().await {
            debug!(error = %e, "error closing export connection");
        }
        let fetched = fetched.map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;

        fetched
            .iter()
            .map(|row| -> Result<ExportRow> {
                let mut out: ExportRow = Default::default();
                for (index, cell) in out.iter_mut().enumerate() {
                    *cell = row
                        .try_get::<Option<String>, _>(index)
                        .map_err(|e| DatabaseError::QueryFailed(e.to_string()))?;
                }
                Ok(out)
            })
            .collect()
    }
}

#[async_trait]
impl ExportGenerator for PgExporter {
    async fn export_to_csv(&self, output: &Path) -> Result<ExportReport> {
        info!(database = %self.config.name, "running price-list query");
        let rows = self.fetch_rows().await?;
        debug!(rows = rows.len(), "price-list query returned");

        let path = output.to_path_buf();
        let report = tokio::task::spawn_blocking(move || write_csv(&path, &rows))
            .await
            .map_err(|e| DatabaseError::ExportWriteFailed {
                path: output.to_path_buf(),
                reason: e.to_string(),
            })??;

        info!(path = ?report.path, rows = report.rows, "export written");
        Ok(report)
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

/// Write the header and `rows` to `path`, creating parent directories
///
/// SQL NULL becomes an empty cell. A partially written file is removed.
pub fn write_csv(path: &Path, rows: &[ExportRow]) -> Result<ExportReport> {
    let write_failed = |reason: String| DatabaseError::ExportWriteFailed {
        path: path.to_path_buf(),
        reason,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| write_failed(e.to_string()))?;
    }

    let written = (|| -> std::result::Result<(), csv::Error> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
        writer.write_record(EXPORT_COLUMNS)?;
        for row in rows {
            writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }
        writer.flush()?;
        Ok(())
    })();

    if let Err(e) = written {
        if let Err(remove_err) = std::fs::remove_file(path)
            && remove_err.kind() != std::io::ErrorKind::NotFound
        {
            warn!(?path, error = %remove_err, "failed to remove partial export");
        }
        return Err(write_failed(e.to_string()).into());
    }

    Ok(ExportReport {
        path: path.to_path_buf(),
        rows: rows.len(),
    })
}
