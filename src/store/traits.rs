//! Traits and types for artifact store access

use crate::types::BackupArtifact;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A backup artifact saved to local storage
#[must_use]
#[derive(Debug, Clone)]
pub struct LocalArtifact {
    /// The remote artifact that was fetched
    pub artifact: BackupArtifact,
    /// Where the bytes were written
    pub path: PathBuf,
    /// Number of bytes written
    pub size: u64,
}

/// Trait for remote backup storage
///
/// Implementations authenticate on every call that touches the remote API;
/// backup fetches are infrequent, so no token is cached between calls.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// List backup artifacts in the configured folder, newest first
    ///
    /// Artifacts sharing a timestamp are ordered by name ascending.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Auth`] if a token cannot be obtained and
    /// [`crate::Error::Transfer`] on any transport failure. An empty folder
    /// is not an error.
    async fn list_backups(&self) -> crate::Result<Vec<BackupArtifact>>;

    /// Download the newest backup artifact to `destination`
    ///
    /// On success the parent directory of `destination` exists and the full
    /// content has been flushed to disk.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Transfer`] if the listing is empty or any
    /// network or write step fails.
    async fn download_latest(&self, destination: &Path) -> crate::Result<LocalArtifact>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
