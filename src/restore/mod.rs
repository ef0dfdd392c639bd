//! Database restore from a downloaded backup
//!
//! This module provides a trait-based seam for recreating the target database
//! from a backup file. The PostgreSQL implementation drives the external
//! `dropdb`, `createdb` and `pg_restore` binaries in order.
//!
//! ## Architecture
//!
//! - [`DatabaseRestorer`]: readiness probe plus the restore sequence
//! - [`PgRestorer`]: implementation using the PostgreSQL client tools
//! - [`BenignDiagnostics`]: decides which non-zero tool exits are tolerated
//!
//! ## Usage
//!
//! ```no_run
//! use pricelist_sync::config::DatabaseConfig;
//! use pricelist_sync::restore::{DatabaseRestorer, PgRestorer};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let restorer = PgRestorer::new(DatabaseConfig::default())?;
//!     if restorer.ensure_running().await {
//!         let report = restorer.restore(Path::new("backup.i5bu")).await?;
//!         for warning in report.warnings() {
//!             println!("{}: {}", warning.phase, warning.diagnostic);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod benign;
mod postgres;
mod traits;

pub use benign::BenignDiagnostics;
pub use postgres::{PgRestorer, PgTools};
pub use traits::{DatabaseRestorer, PhaseWarning, RestorePhase, RestoreReport};

#[cfg(test)]
mod tests;
