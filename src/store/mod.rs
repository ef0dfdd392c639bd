//! Remote artifact store access
//!
//! The pipeline only needs three things from remote storage: a listing of
//! backup artifacts, a way to pick the newest one, and its bytes on local disk.
//! [`ArtifactStore`] captures that contract so the orchestrator can be driven
//! by any store implementation.
//!
//! - [`DropboxStore`]: Dropbox HTTP API with OAuth2 refresh-token auth
//!
//! ## Usage
//!
//! ```no_run
//! use pricelist_sync::config::StoreConfig;
//! use pricelist_sync::store::{ArtifactStore, DropboxStore};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = DropboxStore::new(StoreConfig::default())?;
//!
//!     for backup in store.list_backups().await? {
//!         println!("{} ({})", backup.name, backup.modified);
//!     }
//!
//!     let local = store.download_latest(Path::new("data/backups/latest.i5bu")).await?;
//!     println!("saved {} bytes", local.size);
//!     Ok(())
//! }
//! ```

mod dropbox;
mod traits;

pub use dropbox::{AccessToken, DropboxStore};
pub use traits::{ArtifactStore, LocalArtifact};

#[cfg(test)]
mod tests;
