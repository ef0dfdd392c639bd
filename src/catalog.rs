//! In-memory price catalog over the latest published export
//!
//! The lookup frontend serves searches from the newest export in the export
//! directory. [`PriceCatalog`] owns the currently loaded snapshot and swaps it
//! on [`PriceCatalog::reload`]; readers keep whatever [`Arc`] they were handed,
//! so a reload never changes results mid-search.

use crate::error::{Error, Result, ValidationError};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// One row of a price-list export
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    /// Item name
    pub namaitem: String,
    /// Conversion factor of the unit to the base unit
    #[serde(default)]
    pub konversi: String,
    /// Unit name
    #[serde(default)]
    pub satuan: String,
    /// Cost price; `None` when the export cell is empty
    #[serde(default)]
    pub hargapokok: Option<f64>,
    /// Sale price; `None` when the export cell is empty
    #[serde(default)]
    pub hargajual: Option<f64>,
}

/// Matches for one search
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchResults {
    /// Matching rows sorted by item name, at most `limit` of them
    pub items: Vec<PriceRow>,
    /// Whether more rows matched than were returned
    pub truncated: bool,
}

/// An immutable, fully parsed export
#[derive(Clone, Debug)]
pub struct CatalogSnapshot {
    /// Export file this snapshot was loaded from
    pub source: PathBuf,
    /// Modification time of the export
    pub loaded_at: DateTime<Local>,
    /// All rows in file order
    pub rows: Vec<PriceRow>,
}

impl CatalogSnapshot {
    /// Parse an export file
    pub fn load(path: &Path) -> Result<Self> {
        let rejected = |reason: String| ValidationError::ExportRejected {
            path: path.to_path_buf(),
            reason,
        };

        let modified = std::fs::metadata(path)?.modified()?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .map_err(|e| rejected(e.to_string()))?;

        let rows = reader
            .deserialize::<PriceRow>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| rejected(e.to_string()))?;

        Ok(Self {
            source: path.to_path_buf(),
            loaded_at: DateTime::<Local>::from(modified),
            rows,
        })
    }

    /// Case-insensitive substring search on the item name
    ///
    /// The keyword is trimmed; a blank keyword matches nothing.
    pub fn search(&self, keyword: &str, limit: usize) -> SearchResults {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return SearchResults::default();
        }

        let mut matches: Vec<&PriceRow> = self
            .rows
            .iter()
            .filter(|row| row.namaitem.to_lowercase().contains(&needle))
            .collect();
        matches.sort_by(|a, b| a.namaitem.cmp(&b.namaitem));

        SearchResults {
            truncated: matches.len() > limit,
            items: matches.into_iter().take(limit).cloned().collect(),
        }
    }
}

/// Owned cache of the latest export
pub struct PriceCatalog {
    exports_dir: PathBuf,
    current: RwLock<Option<Arc<CatalogSnapshot>>>,
}

impl PriceCatalog {
    /// Create an empty catalog reading from `exports_dir`
    pub fn new(exports_dir: impl Into<PathBuf>) -> Self {
        Self {
            exports_dir: exports_dir.into(),
            current: RwLock::new(None),
        }
    }

    /// Load the most recently modified export and make it current
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the directory holds no export, and
    /// [`ValidationError::ExportRejected`] if the newest one does not parse.
    /// The previous snapshot stays current on error.
    pub async fn reload(&self) -> Result<Arc<CatalogSnapshot>> {
        let latest = crate::retention::latest_export(&self.exports_dir)
            .await?
            .ok_or_else(|| {
                Error::NotFound(format!("no CSV files in {}", self.exports_dir.display()))
            })?;

        let snapshot = tokio::task::spawn_blocking(move || CatalogSnapshot::load(&latest))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e)))??;
        let snapshot = Arc::new(snapshot);

        info!(
            source = ?snapshot.source,
            rows = snapshot.rows.len(),
            "price catalog reloaded"
        );
        *self.current.write().await = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// The current snapshot, if one was loaded
    pub async fn snapshot(&self) -> Option<Arc<CatalogSnapshot>> {
        self.current.read().await.clone()
    }
}
