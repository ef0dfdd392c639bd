//! # pricelist-sync
//!
//! Unattended sync of a point-of-sale price list from nightly database backups.
//!
//! One run of the pipeline downloads the newest backup from Dropbox, restores
//! it into PostgreSQL, exports a flattened price list to CSV and publishes it
//! for the lookup frontend. Old exports are pruned afterwards.
//!
//! ## Guarantees
//!
//! - **Fail fast** - the first failing stage ends the run; nothing is retried
//! - **No unvalidated exports** - an export is written to a staging directory
//!   and only renamed into the export directory after it passes validation
//! - **Event-driven** - consumers subscribe to stage transitions instead of
//!   parsing logs
//!
//! ## Quick Start
//!
//! ```no_run
//! use pricelist_sync::{Config, SyncPipeline};
//! use pricelist_sync::config::StoreConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         store: StoreConfig {
//!             app_key: "app-key".to_string(),
//!             app_secret: "app-secret".to_string(),
//!             refresh_token: "refresh-token".to_string(),
//!             ..Default::default()
//!         },
//!         ..Default::default()
//!     };
//!
//!     let pipeline = SyncPipeline::from_config(config)?;
//!
//!     // Subscribe to events
//!     let mut events = pipeline.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = pipeline.run().await?;
//!     println!("published {} rows to {}", report.rows, report.export_path.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Price catalog served to the lookup frontend
pub mod catalog;
/// Configuration types
pub mod config;
/// PostgreSQL connections
pub mod db;
/// Error types
pub mod error;
/// Price-list export
pub mod export;
/// Sync pipeline orchestration
pub mod pipeline;
/// Database restore
pub mod restore;
/// Export retention
pub mod retention;
/// Remote artifact store
pub mod store;
/// Core types
pub mod types;
/// Integrity checks
pub mod validate;

// Re-export commonly used types
pub use catalog::{CatalogSnapshot, PriceCatalog, PriceRow, SearchResults};
pub use config::Config;
pub use error::{
    AuthError, DatabaseError, Error, Result, TransferError, ValidationError,
};
pub use export::{ExportGenerator, ExportReport, PgExporter};
pub use pipeline::{SyncFailure, SyncPipeline, SyncReport};
pub use restore::{BenignDiagnostics, DatabaseRestorer, PgRestorer, RestoreReport};
pub use retention::{CleanupReport, RetentionManager};
pub use store::{ArtifactStore, DropboxStore};
pub use types::{BackupArtifact, Event, PipelineState, RunStamp};
